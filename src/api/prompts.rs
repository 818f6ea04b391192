/// Prompt endpoints: feed, CRUD, version history, and the remix tree
use crate::{
    auth::{AuthContext, OptionalAuthContext},
    context::AppContext,
    db::models::{Fork, Prompt, PromptVersion},
    error::AppResult,
    metrics,
    prompts::{NewPrompt, PromptFeedPage, PromptQuery, PromptUpdate, RemixNode, DEFAULT_REMIX_DEPTH_CAP},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/prompts", get(feed).post(create))
        .route("/api/prompts/mine", get(list_mine))
        .route(
            "/api/prompts/:id",
            get(get_prompt).patch(update_prompt).delete(delete_prompt),
        )
        .route("/api/prompts/:id/versions", get(list_versions))
        .route("/api/prompts/:id/versions/:number", get(get_version))
        .route("/api/prompts/:id/versions/:number/restore", post(restore_version))
        .route("/api/prompts/:id/fork", post(fork))
        .route("/api/prompts/:id/tree", get(remix_tree))
        .route("/api/prompts/:id/parent", get(parent_edge))
}

async fn feed(
    State(ctx): State<AppContext>,
    Query(query): Query<PromptQuery>,
) -> AppResult<Json<PromptFeedPage>> {
    let page = ctx.prompt_store.list(&query).await?;
    Ok(Json(page))
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(new): Json<NewPrompt>,
) -> AppResult<Json<Prompt>> {
    let prompt = ctx.prompt_store.create(&auth.user_id, new).await?;
    metrics::record_prompt_event("created");
    Ok(Json(prompt))
}

async fn list_mine(State(ctx): State<AppContext>, auth: AuthContext) -> AppResult<Json<Vec<Prompt>>> {
    let prompts = ctx.prompt_store.list_owned(&auth.user_id).await?;
    Ok(Json(prompts))
}

async fn get_prompt(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Prompt>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let prompt = ctx.prompt_store.get_visible(&id, viewer).await?;
    ctx.prompt_store.record_view(&id).await?;
    Ok(Json(prompt))
}

async fn update_prompt(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
    Json(update): Json<PromptUpdate>,
) -> AppResult<Json<Prompt>> {
    let prompt = ctx.prompt_store.update(&id, &auth.user_id, update).await?;
    metrics::record_prompt_event("updated");
    Ok(Json(prompt))
}

async fn delete_prompt(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.prompt_store.delete(&id, &auth.user_id).await?;
    metrics::record_prompt_event("deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_versions(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Vec<PromptVersion>>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    ctx.prompt_store.get_visible(&id, viewer).await?;
    let versions = ctx.version_manager.list(&id).await?;
    Ok(Json(versions))
}

async fn get_version(
    State(ctx): State<AppContext>,
    Path((id, number)): Path<(String, i64)>,
    auth: OptionalAuthContext,
) -> AppResult<Json<PromptVersion>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    ctx.prompt_store.get_visible(&id, viewer).await?;
    let version = ctx.version_manager.get(&id, number).await?;
    Ok(Json(version))
}

async fn restore_version(
    State(ctx): State<AppContext>,
    Path((id, number)): Path<(String, i64)>,
    auth: AuthContext,
) -> AppResult<Json<Prompt>> {
    let prompt = ctx.version_manager.restore(&id, number, &auth.user_id).await?;
    metrics::record_prompt_event("version_restored");
    Ok(Json(prompt))
}

async fn fork(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<Prompt>> {
    let remix = ctx.fork_manager.fork(&id, &auth.user_id).await?;
    metrics::record_prompt_event("forked");
    Ok(Json(remix))
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    depth: Option<usize>,
}

async fn remix_tree(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<TreeQuery>,
    auth: OptionalAuthContext,
) -> AppResult<Json<RemixNode>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let depth = query
        .depth
        .unwrap_or(DEFAULT_REMIX_DEPTH_CAP)
        .min(DEFAULT_REMIX_DEPTH_CAP);
    let tree = ctx.fork_manager.remix_tree(&id, viewer, depth).await?;
    Ok(Json(tree))
}

async fn parent_edge(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Option<Fork>>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let edge = ctx.fork_manager.parent_edge(&id, viewer).await?;
    Ok(Json(edge))
}
