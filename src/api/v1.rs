/// Public read-only API, gated by per-user API keys
///
/// Clients present their secret in the `x-api-key` header. Every request
/// is charged against the key's own per-minute window; the process-wide
/// limiter skips these routes.
use crate::{
    context::AppContext,
    db::models::{ApiKey, Prompt},
    error::{AppError, AppResult},
    metrics,
    prompts::{PromptFeedPage, PromptQuery, RemixNode, DEFAULT_REMIX_DEPTH_CAP},
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/v1/prompts", get(feed))
        .route("/v1/prompts/:id", get(get_prompt))
        .route("/v1/prompts/:id/tree", get(remix_tree))
}

/// Admit the request or reject it with 401/429
async fn admit(ctx: &AppContext, headers: &HeaderMap) -> AppResult<ApiKey> {
    let secret = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            metrics::record_api_key_rejection("missing");
            AppError::Authentication("Missing x-api-key header".to_string())
        })?;

    ctx.api_key_manager.verify_and_charge(secret).await.map_err(|e| {
        let reason = match &e {
            AppError::RateLimitExceeded { .. } => "rate_limited",
            _ => "invalid",
        };
        metrics::record_api_key_rejection(reason);
        e
    })
}

async fn feed(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Query(query): Query<PromptQuery>,
) -> AppResult<Json<PromptFeedPage>> {
    admit(&ctx, &headers).await?;
    let page = ctx.prompt_store.list(&query).await?;
    Ok(Json(page))
}

async fn get_prompt(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<Prompt>> {
    let key = admit(&ctx, &headers).await?;
    // Key holders see what their owning user can see
    let prompt = ctx.prompt_store.get_visible(&id, Some(&key.user_id)).await?;
    Ok(Json(prompt))
}

async fn remix_tree(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<RemixNode>> {
    let key = admit(&ctx, &headers).await?;
    let tree = ctx
        .fork_manager
        .remix_tree(&id, Some(&key.user_id), DEFAULT_REMIX_DEPTH_CAP)
        .await?;
    Ok(Json(tree))
}
