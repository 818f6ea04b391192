/// Collection endpoints
use crate::{
    auth::{AuthContext, OptionalAuthContext},
    collections::CollectionInput,
    context::AppContext,
    db::models::{Collection, Prompt},
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/collections", get(list_mine).post(create))
        .route(
            "/api/collections/:id",
            get(get_collection).put(update).delete(delete_collection),
        )
        .route("/api/collections/:id/items", get(items))
        .route(
            "/api/collections/:id/items/:prompt_id",
            post(add_item).delete(remove_item),
        )
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(input): Json<CollectionInput>,
) -> AppResult<Json<Collection>> {
    let collection = ctx.collection_manager.create(&auth.user_id, input).await?;
    Ok(Json(collection))
}

async fn list_mine(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Collection>>> {
    let collections = ctx.collection_manager.list_owned(&auth.user_id).await?;
    Ok(Json(collections))
}

async fn get_collection(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Collection>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let collection = ctx.collection_manager.get_visible(&id, viewer).await?;
    Ok(Json(collection))
}

async fn update(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
    Json(input): Json<CollectionInput>,
) -> AppResult<Json<Collection>> {
    let collection = ctx.collection_manager.update(&id, &auth.user_id, input).await?;
    Ok(Json(collection))
}

async fn delete_collection(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.collection_manager.delete(&id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn items(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: OptionalAuthContext,
) -> AppResult<Json<Vec<Prompt>>> {
    let viewer = auth.auth.as_ref().map(|a| a.user_id.as_str());
    let prompts = ctx.collection_manager.items(&id, viewer).await?;
    Ok(Json(prompts))
}

async fn add_item(
    State(ctx): State<AppContext>,
    Path((id, prompt_id)): Path<(String, String)>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.collection_manager
        .add_item(&id, &prompt_id, &auth.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn remove_item(
    State(ctx): State<AppContext>,
    Path((id, prompt_id)): Path<(String, String)>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.collection_manager
        .remove_item(&id, &prompt_id, &auth.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
