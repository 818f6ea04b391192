/// API keys for the public v1 API
///
/// Secrets are minted once, shown once, and stored only as a SHA-256 digest.
/// Each key carries its own fixed-window rate limit, counted on the key row.
use crate::{
    config::ServerConfig,
    db::models::ApiKey,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const KEY_SECRET_BYTES: usize = 20;
const WINDOW_SECS: i64 = 60;

/// A freshly minted key: the only time the secret is visible
#[derive(Debug)]
pub struct MintedKey {
    pub key: ApiKey,
    pub secret: String,
}

/// API key manager service
pub struct ApiKeyManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl ApiKeyManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Mint a key for a user. The secret is returned exactly once.
    pub async fn create_key(&self, user_id: &str, name: &str) -> AppResult<MintedKey> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Key name cannot be empty".to_string()));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM api_keys WHERE user_id = ?1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        if existing >= self.config.api_keys.max_keys_per_user {
            return Err(AppError::Validation(format!(
                "At most {} active keys per user",
                self.config.api_keys.max_keys_per_user
            )));
        }

        let secret = generate_secret();
        let key_hash = hash_secret(&secret);
        let key_prefix = secret[..8.min(secret.len())].to_string();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let rate_limit = self.config.api_keys.default_rate_limit_per_minute;

        sqlx::query(
            "INSERT INTO api_keys (id, user_id, name, key_prefix, key_hash, request_count,
                                   rate_limit_per_minute, window_request_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 0, ?7)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(&key_prefix)
        .bind(&key_hash)
        .bind(rate_limit)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(MintedKey {
            key: ApiKey {
                id,
                user_id: user_id.to_string(),
                name: name.to_string(),
                key_prefix,
                key_hash,
                request_count: 0,
                rate_limit_per_minute: rate_limit,
                window_started_at: None,
                window_request_count: 0,
                revoked_at: None,
                last_used_at: None,
                created_at: now,
            },
            secret,
        })
    }

    /// List a user's keys. Secrets are not recoverable; prefix only.
    pub async fn list_keys(&self, user_id: &str) -> AppResult<Vec<ApiKey>> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(keys)
    }

    /// Revoke a key. Owner-only. Idempotent.
    pub async fn revoke_key(&self, key_id: &str, user_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = ?3 WHERE id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
        )
        .bind(key_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE id = ?1 AND user_id = ?2")
                    .bind(key_id)
                    .bind(user_id)
                    .fetch_one(&self.db)
                    .await?;
            if exists == 0 {
                return Err(AppError::NotFound("API key not found".to_string()));
            }
        }

        Ok(())
    }

    /// Verify a presented secret and charge the request against the key's
    /// rate window. This is the whole admission decision for /v1 calls:
    /// unknown or revoked keys are rejected, and request N+1 inside a
    /// 60-second window gets 429 with a Retry-After hint.
    pub async fn verify_and_charge(&self, secret: &str) -> AppResult<ApiKey> {
        let key_hash = hash_secret(secret);

        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key_hash = ?1")
            .bind(&key_hash)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::Authorization("Invalid API key".to_string()))?;

        if key.revoked_at.is_some() {
            return Err(AppError::Authorization("API key revoked".to_string()));
        }

        let now = Utc::now();
        let window_floor = now - Duration::seconds(WINDOW_SECS);

        // One conditional UPDATE decides admission: a window older than the
        // floor restarts at 1, otherwise the count increments only while it
        // is under the key's limit. Concurrent requests cannot slip between
        // a read and a write.
        let result = sqlx::query(
            "UPDATE api_keys
             SET window_started_at = CASE
                     WHEN window_started_at IS NULL OR window_started_at <= ?2 THEN ?3
                     ELSE window_started_at
                 END,
                 window_request_count = CASE
                     WHEN window_started_at IS NULL OR window_started_at <= ?2 THEN 1
                     ELSE window_request_count + 1
                 END,
                 request_count = request_count + 1,
                 last_used_at = ?3
             WHERE id = ?1
               AND (window_started_at IS NULL
                    OR window_started_at <= ?2
                    OR window_request_count < rate_limit_per_minute)",
        )
        .bind(&key.id)
        .bind(window_floor)
        .bind(now)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let retry_after = retry_after(key.window_started_at, now);
            return Err(AppError::RateLimitExceeded { retry_after });
        }

        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = ?1")
            .bind(&key.id)
            .fetch_one(&self.db)
            .await?;
        Ok(key)
    }
}

fn retry_after(window_started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> std::time::Duration {
    let elapsed = window_started_at
        .map(|s| (now - s).num_seconds())
        .unwrap_or(0)
        .clamp(0, WINDOW_SECS);
    std::time::Duration::from_secs((WINDOW_SECS - elapsed).max(1) as u64)
}

/// Secret format: `pp_` + 40 hex chars
fn generate_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; KEY_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("pp_{}", hex::encode(bytes))
}

/// SHA-256 hex digest of a secret
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};

    fn test_config() -> Arc<ServerConfig> {
        std::env::set_var("PP_JWT_SECRET", "test-secret-test-secret-test-secret!");
        Arc::new(ServerConfig::from_env().expect("config"))
    }

    async fn setup() -> (ApiKeyManager, SqlitePool, String) {
        let pool = test_pool().await;
        let user = seed_user(&pool, "keyholder").await;
        (ApiKeyManager::new(pool.clone(), test_config()), pool, user)
    }

    #[test]
    fn secret_format_and_digest() {
        let secret = generate_secret();
        assert!(secret.starts_with("pp_"));
        assert_eq!(secret.len(), 3 + KEY_SECRET_BYTES * 2);
        assert_eq!(hash_secret(&secret).len(), 64);
        assert_ne!(hash_secret(&secret), secret);
    }

    #[tokio::test]
    async fn mint_verify_revoke() {
        let (mgr, _pool, user) = setup().await;
        let minted = mgr.create_key(&user, "ci bot").await.unwrap();

        let key = mgr.verify_and_charge(&minted.secret).await.unwrap();
        assert_eq!(key.user_id, user);
        assert_eq!(key.window_request_count, 1);

        mgr.revoke_key(&minted.key.id, &user).await.unwrap();
        let err = mgr.verify_and_charge(&minted.secret).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn unknown_secret_rejected() {
        let (mgr, _pool, _user) = setup().await;
        let err = mgr.verify_and_charge("pp_not_a_real_key").await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn window_limit_enforced_and_resets() {
        let (mgr, pool, user) = setup().await;
        let minted = mgr.create_key(&user, "hot client").await.unwrap();

        // Tighten the limit so the test stays small
        sqlx::query("UPDATE api_keys SET rate_limit_per_minute = 3 WHERE id = ?1")
            .bind(&minted.key.id)
            .execute(&pool)
            .await
            .unwrap();

        for _ in 0..3 {
            mgr.verify_and_charge(&minted.secret).await.unwrap();
        }
        let err = mgr.verify_and_charge(&minted.secret).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded { .. }));

        // The rejected request left the row untouched
        let (requests, window): (i64, i64) = sqlx::query_as(
            "SELECT request_count, window_request_count FROM api_keys WHERE id = ?1",
        )
        .bind(&minted.key.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(requests, 3);
        assert_eq!(window, 3);

        // Age the window past 60 seconds; the next request is admitted
        let old = Utc::now() - Duration::seconds(WINDOW_SECS + 1);
        sqlx::query("UPDATE api_keys SET window_started_at = ?1 WHERE id = ?2")
            .bind(old)
            .bind(&minted.key.id)
            .execute(&pool)
            .await
            .unwrap();

        let key = mgr.verify_and_charge(&minted.secret).await.unwrap();
        assert_eq!(key.window_request_count, 1);
        // 3 admitted in the first window + this one; the rejected call was not charged
        assert_eq!(key.request_count, 4);
    }

    #[tokio::test]
    async fn key_cap_per_user() {
        let (mgr, _pool, user) = setup().await;
        for i in 0..10 {
            mgr.create_key(&user, &format!("key {}", i)).await.unwrap();
        }
        let err = mgr.create_key(&user, "one too many").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
