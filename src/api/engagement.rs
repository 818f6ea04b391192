/// Engagement endpoints: likes, bookmarks, comments
use crate::{
    auth::{AuthContext, OptionalAuthContext},
    context::AppContext,
    db::models::{Comment, Prompt},
    error::AppResult,
    metrics,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/prompts/:id/like", post(like).delete(unlike))
        .route("/api/prompts/liked", get(list_liked))
        .route("/api/prompts/:id/liked", get(has_liked))
        .route("/api/prompts/:id/bookmark", post(bookmark).delete(unbookmark))
        .route("/api/bookmarks", get(list_bookmarks))
        .route("/api/prompts/:id/comments", get(list_comments).post(comment))
        .route("/api/comments/:id", delete(delete_comment))
}

async fn like(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.engagement_manager.like(&auth.user_id, &id).await?;
    metrics::record_engagement_event("like");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn unlike(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.engagement_manager.unlike(&auth.user_id, &id).await?;
    metrics::record_engagement_event("unlike");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn has_liked(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    let liked = ctx.engagement_manager.has_liked(&auth.user_id, &id).await?;
    Ok(Json(serde_json::json!({ "liked": liked })))
}

async fn bookmark(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.engagement_manager.bookmark(&auth.user_id, &id).await?;
    metrics::record_engagement_event("bookmark");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn unbookmark(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.engagement_manager.unbookmark(&auth.user_id, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_liked(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Prompt>>> {
    let prompts = ctx.engagement_manager.liked_prompts(&auth.user_id).await?;
    Ok(Json(prompts))
}

async fn list_bookmarks(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Prompt>>> {
    let prompts = ctx.engagement_manager.bookmarked_prompts(&auth.user_id).await?;
    Ok(Json(prompts))
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    body: String,
}

async fn comment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<Comment>> {
    let comment = ctx
        .engagement_manager
        .comment(&auth.user_id, &id, &req.body)
        .await?;
    metrics::record_engagement_event("comment");
    Ok(Json(comment))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Vec<Comment>>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let comments = ctx.engagement_manager.list_comments(&id, viewer).await?;
    Ok(Json(comments))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.engagement_manager.delete_comment(&id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
