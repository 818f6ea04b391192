/// Gamification endpoints: progress, challenges
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::Challenge,
    error::AppResult,
    gamification::ProgressView,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/progress", get(my_progress))
        .route("/api/users/:id/progress", get(user_progress))
        .route("/api/challenges", get(active_challenges))
        .route("/api/challenges/:id/enter", post(enter_challenge))
}

async fn my_progress(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<ProgressView>> {
    let progress = ctx.gamification_manager.progress(&auth.user_id).await?;
    Ok(Json(progress))
}

async fn user_progress(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<ProgressView>> {
    let progress = ctx.gamification_manager.progress(&id).await?;
    Ok(Json(progress))
}

async fn active_challenges(State(ctx): State<AppContext>) -> AppResult<Json<Vec<Challenge>>> {
    let challenges = ctx.gamification_manager.active_challenges().await?;
    Ok(Json(challenges))
}

#[derive(Debug, Deserialize)]
struct EnterRequest {
    prompt_id: String,
}

async fn enter_challenge(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
    Json(req): Json<EnterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.gamification_manager
        .enter_challenge(&id, &req.prompt_id, &auth.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
