/// Team endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{Team, TeamMember},
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/teams", get(list_mine).post(create))
        .route("/api/teams/:id/members", get(members).post(add_member))
        .route("/api/teams/:id/members/:user_id", axum::routing::delete(remove_member))
}

#[derive(Debug, Deserialize)]
struct CreateTeamRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AddMemberRequest {
    user_id: String,
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateTeamRequest>,
) -> AppResult<Json<Team>> {
    let team = ctx.team_manager.create(&auth.user_id, &req.name).await?;
    Ok(Json(team))
}

async fn list_mine(State(ctx): State<AppContext>, auth: AuthContext) -> AppResult<Json<Vec<Team>>> {
    let teams = ctx.team_manager.list_for_user(&auth.user_id).await?;
    Ok(Json(teams))
}

async fn members(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
) -> AppResult<Json<Vec<TeamMember>>> {
    let members = ctx.team_manager.members(&id, &auth.user_id).await?;
    Ok(Json(members))
}

async fn add_member(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    auth: AuthContext,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.team_manager.add_member(&id, &req.user_id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn remove_member(
    State(ctx): State<AppContext>,
    Path((id, user_id)): Path<(String, String)>,
    auth: AuthContext,
) -> AppResult<Json<serde_json::Value>> {
    ctx.team_manager.remove_member(&id, &user_id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
