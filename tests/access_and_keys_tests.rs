/// Access gate tokens and public API key admission against a real database.
use prompt_party::{
    access_gate::{issue_gate_token, verify_gate_token},
    account::{hash_password, verify_password, AccountManager},
    api_keys::ApiKeyManager,
    config::{AccessGateConfig, ServerConfig},
    db,
    error::AppError,
};
use std::sync::Arc;

fn test_config() -> Arc<ServerConfig> {
    std::env::set_var("PP_JWT_SECRET", "integration-test-secret-0123456789abcdef");
    Arc::new(ServerConfig::from_env().expect("config"))
}

#[test]
fn gate_round_trip_and_password_check() {
    let gate = AccessGateConfig {
        password_hash: hash_password("party-time").unwrap(),
        token_secret: "0123456789abcdef0123456789abcdef".to_string(),
        token_ttl: 3600,
    };

    assert!(verify_password("party-time", &gate.password_hash).unwrap());
    assert!(!verify_password("wrong", &gate.password_hash).unwrap());

    let token = issue_gate_token(&gate).unwrap();
    assert!(verify_gate_token(&gate, &token));
    assert!(!verify_gate_token(&gate, "garbage"));
}

#[tokio::test]
async fn api_key_lifecycle_against_database() {
    let config = test_config();
    let dir = tempfile::tempdir().unwrap();
    let pool = db::create_pool(&dir.path().join("keys.sqlite"), db::DatabaseOptions::default())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let accounts = AccountManager::new(pool.clone(), Arc::clone(&config));
    let (user, _) = accounts
        .register("keysmith".to_string(), None, "password123".to_string(), None)
        .await
        .unwrap();

    let keys = ApiKeyManager::new(pool.clone(), config);
    let minted = keys.create_key(&user.id, "integration").await.unwrap();
    assert!(minted.secret.starts_with("pp_"));

    // The stored row never contains the plaintext secret
    let stored: String = sqlx::query_scalar("SELECT key_hash FROM api_keys WHERE id = ?1")
        .bind(&minted.key.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_ne!(stored, minted.secret);

    let charged = keys.verify_and_charge(&minted.secret).await.unwrap();
    assert_eq!(charged.user_id, user.id);

    keys.revoke_key(&minted.key.id, &user.id).await.unwrap();
    let err = keys.verify_and_charge(&minted.secret).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}
