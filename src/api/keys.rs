/// API key management endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::ApiKey,
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/keys", get(list_keys).post(create_key))
        .route("/api/keys/:id", delete(revoke_key))
}

#[derive(Debug, Deserialize)]
struct CreateKeyRequest {
    name: String,
}

/// The plaintext secret appears here and nowhere else
#[derive(Debug, Serialize)]
struct CreateKeyResponse {
    key: ApiKey,
    secret: String,
}

async fn create_key(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateKeyRequest>,
) -> AppResult<Json<CreateKeyResponse>> {
    let minted = ctx.api_key_manager.create_key(&auth.user_id, &req.name).await?;
    Ok(Json(CreateKeyResponse {
        key: minted.key,
        secret: minted.secret,
    }))
}

async fn list_keys(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<ApiKey>>> {
    let keys = ctx.api_key_manager.list_keys(&auth.user_id).await?;
    Ok(Json(keys))
}

async fn revoke_key(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.api_key_manager.revoke_key(&id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
