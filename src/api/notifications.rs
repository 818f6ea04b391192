/// Notification endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::Notification,
    error::AppResult,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/unread_count", get(unread_count))
        .route("/api/notifications/:id/read", post(mark_read))
        .route("/api/notifications/read_all", post(mark_all_read))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
}

async fn list(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let notifications = ctx.notification_manager.list(&auth.user_id, limit).await?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    let count = ctx.notification_manager.unread_count(&auth.user_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

async fn mark_read(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.notification_manager.mark_read(&id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn mark_all_read(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    let updated = ctx.notification_manager.mark_all_read(&auth.user_id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
