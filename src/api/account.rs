/// Account endpoints: registration, sessions, profile
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{Session, User},
    error::{AppError, AppResult},
    metrics,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/account/register", post(register))
        .route("/api/account/login", post(login))
        .route("/api/account/refresh", post(refresh))
        .route("/api/account/logout", post(logout))
        .route("/api/account/me", get(me))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    handle: String,
    email: Option<String>,
    password: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    identifier: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user: User,
    access_token: String,
    refresh_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

fn session_response(user: User, session: Session) -> SessionResponse {
    SessionResponse {
        user,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        expires_at: session.expires_at,
    }
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<SessionResponse>> {
    let result = ctx
        .account_manager
        .register(req.handle, req.email.clone(), req.password, req.display_name)
        .await;
    metrics::record_account_creation(result.is_ok());
    let (user, session) = result?;

    // Welcome mail is best-effort; registration never fails on SMTP trouble
    if let Some(email) = req.email {
        let mailer = ctx.mailer.clone();
        let handle = user.handle.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_welcome_email(&email, &handle).await {
                tracing::warn!("Failed to send welcome email: {}", e);
            }
        });
    }

    tracing::info!("Registered account {}", user.handle);
    Ok(Json(session_response(user, session)))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let (user, session) = ctx.account_manager.login(&req.identifier, &req.password).await?;
    Ok(Json(session_response(user, session)))
}

async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<SessionResponse>> {
    let (user, session) = ctx.account_manager.refresh_session(&req.refresh_token).await?;
    Ok(Json(session_response(user, session)))
}

async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager.logout(&auth.session.session_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> AppResult<Json<User>> {
    let user = ctx
        .account_manager
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}
