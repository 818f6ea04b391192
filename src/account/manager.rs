/// Account manager implementation using runtime queries
use crate::{
    account::ValidatedSession,
    config::ServerConfig,
    db::models::{Session, User, UserProgress},
    error::{AppError, AppResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    /// User id
    sub: String,
    /// Session id
    sid: String,
    /// User handle
    handle: String,
    exp: i64,
    iat: i64,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new account and an initial session
    pub async fn register(
        &self,
        handle: String,
        email: Option<String>,
        password: String,
        display_name: Option<String>,
    ) -> AppResult<(User, Session)> {
        self.validate_handle(&handle)?;
        if let Some(ref email_str) = email {
            self.validate_email(email_str)?;
        }
        if password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if self.handle_exists(&handle).await? {
            return Err(AppError::Conflict(format!("Handle {} already taken", handle)));
        }
        if let Some(ref email_str) = email {
            if self.email_exists(email_str).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let password_hash = hash_password(&password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, handle, email, password_hash, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&id)
        .bind(&handle)
        .bind(&email)
        .bind(&password_hash)
        .bind(&display_name)
        .bind(now)
        .execute(&self.db)
        .await?;

        // Gamification counters start at zero on signup
        sqlx::query(
            "INSERT INTO user_progress (user_id, points, prompts_created, likes_received, forks_received, updated_at)
             VALUES (?1, 0, 0, 0, 0, ?2)",
        )
        .bind(&id)
        .bind(now)
        .execute(&self.db)
        .await?;

        let user = User {
            id: id.clone(),
            handle: handle.clone(),
            email,
            password_hash,
            display_name,
            created_at: now,
            deactivated_at: None,
        };

        let session = self.create_session(&user).await?;

        Ok((user, session))
    }

    /// Authenticate by handle or email and create a session
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<(User, Session)> {
        let user = self
            .get_user_by_identifier(identifier)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if user.deactivated_at.is_some() {
            return Err(AppError::Authorization("Account is deactivated".to_string()));
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let session = self.create_session(&user).await?;

        Ok((user, session))
    }

    /// Create a session for a user
    pub async fn create_session(&self, user: &User) -> AppResult<Session> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.session_ttl);

        let claims = AccessClaims {
            sub: user.id.clone(),
            sid: session_id.clone(),
            handle: user.handle.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Jwt(format!("Failed to sign token: {}", e)))?;

        let refresh_token = generate_opaque_token();
        let refresh_expires =
            now + Duration::seconds(self.config.authentication.refresh_ttl);

        sqlx::query(
            "INSERT INTO sessions (id, user_id, access_token, refresh_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&session_id)
        .bind(&user.id)
        .bind(&access_token)
        .bind(&refresh_token)
        .bind(now)
        .bind(refresh_expires)
        .execute(&self.db)
        .await?;

        Ok(Session {
            id: session_id,
            user_id: user.id.clone(),
            access_token,
            refresh_token,
            created_at: now,
            expires_at: refresh_expires,
        })
    }

    /// Validate an access token and return the session it belongs to
    pub async fn validate_access_token(&self, token: &str) -> AppResult<ValidatedSession> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;

        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Authentication("Token has expired".to_string())
            }
            _ => AppError::Authentication("Invalid token".to_string()),
        })?;

        // The session row must still exist; logout deletes it
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE id = ?1 AND user_id = ?2")
                .bind(&data.claims.sid)
                .bind(&data.claims.sub)
                .fetch_optional(&self.db)
                .await?;

        if exists.is_none() {
            return Err(AppError::Authentication("Session revoked".to_string()));
        }

        Ok(ValidatedSession {
            user_id: data.claims.sub,
            session_id: data.claims.sid,
            handle: data.claims.handle,
        })
    }

    /// Exchange a refresh token for a fresh session
    pub async fn refresh_session(&self, refresh_token: &str) -> AppResult<(User, Session)> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE refresh_token = ?1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid refresh token".to_string()))?;

        if session.expires_at < Utc::now() {
            return Err(AppError::Authentication("Refresh token expired".to_string()));
        }

        let user = self
            .get_user(&session.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))?;

        // Rotate: old session goes away, new one replaces it
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&session.id)
            .execute(&self.db)
            .await?;

        let new_session = self.create_session(&user).await?;
        Ok((user, new_session))
    }

    /// Delete a session
    pub async fn logout(&self, session_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Get a user by id
    pub async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    /// Get a user by handle or email
    pub async fn get_user_by_identifier(&self, identifier: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE handle = ?1 OR email = ?1",
        )
        .bind(identifier)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Gamification counters for a user
    pub async fn get_progress(&self, user_id: &str) -> AppResult<Option<UserProgress>> {
        let progress =
            sqlx::query_as::<_, UserProgress>("SELECT * FROM user_progress WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(progress)
    }

    /// Delete sessions whose refresh window has passed. Returns rows removed.
    pub async fn cleanup_expired_sessions(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn handle_exists(&self, handle: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE handle = ?1")
            .bind(handle)
            .fetch_one(&self.db)
            .await?;
        let count: i64 = row.try_get("count").map_err(AppError::Database)?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;
        let count: i64 = row.try_get("count").map_err(AppError::Database)?;
        Ok(count > 0)
    }

    fn validate_handle(&self, handle: &str) -> AppResult<()> {
        if handle.len() < 3 || handle.len() > 32 {
            return Err(AppError::Validation(
                "Handle must be 3-32 characters".to_string(),
            ));
        }
        if !handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::Validation(
                "Handle may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_email(&self, email: &str) -> AppResult<()> {
        let valid = email.contains('@')
            && !email.starts_with('@')
            && !email.ends_with('@')
            && !email.contains(' ');
        if !valid {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        Ok(())
    }
}

/// Hash a password with Argon2id
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against an Argon2id hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Random 64-hex-char opaque token for refresh flows
fn generate_opaque_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
