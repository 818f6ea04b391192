/// Internal cron endpoints
///
/// External schedulers hit these with the shared cron secret when the
/// in-process job scheduler is not enough (serverless hosts, external
/// monitors). The work is the same as the background jobs.
use crate::{
    context::AppContext,
    error::{AppError, AppResult},
    jobs::tasks,
};
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/internal/cron/cleanup", post(cleanup))
}

fn require_cron_secret(ctx: &AppContext, headers: &HeaderMap) -> AppResult<()> {
    let expected = ctx
        .config
        .authentication
        .cron_secret
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Cron endpoints not enabled".to_string()))?;

    let presented = headers
        .get("x-cron-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing cron secret".to_string()))?;

    if presented != expected {
        return Err(AppError::Authentication("Invalid cron secret".to_string()));
    }
    Ok(())
}

async fn cleanup(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    require_cron_secret(&ctx, &headers)?;

    let sessions = tasks::cleanup_expired_sessions(&ctx).await?;
    let notifications = tasks::prune_notifications(&ctx).await?;
    let presence = tasks::sweep_stale_presence(&ctx).await;

    Ok(Json(json!({
        "sessions_removed": sessions,
        "notifications_pruned": notifications,
        "presence_swept": presence,
    })))
}
