/// Optional site-wide access gate
///
/// When a password hash and token secret are configured, every browser
/// route requires a signed gate token. Clients obtain one by posting the
/// site password to /access/unlock; the token travels back either in the
/// `pp_access` cookie set on the response or in the `x-access-token`
/// header. Health, metrics, the unlock endpoint itself, and the key-gated
/// /v1 API stay reachable without it.
use crate::{
    account::verify_password,
    config::AccessGateConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const GATE_COOKIE: &str = "pp_access";

#[derive(Debug, Serialize, Deserialize)]
struct GateClaims {
    exp: i64,
    iat: i64,
}

/// Sign a gate token
pub fn issue_gate_token(gate: &AccessGateConfig) -> AppResult<String> {
    let now = Utc::now();
    let claims = GateClaims {
        iat: now.timestamp(),
        exp: now.timestamp() + gate.token_ttl,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(gate.token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Jwt(format!("Failed to sign gate token: {}", e)))
}

/// Verify a gate token's signature and expiry
pub fn verify_gate_token(gate: &AccessGateConfig, token: &str) -> bool {
    decode::<GateClaims>(
        token,
        &DecodingKey::from_secret(gate.token_secret.as_bytes()),
        &Validation::default(),
    )
    .is_ok()
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers.get("x-access-token").and_then(|v| v.to_str().ok()) {
        return Some(token.to_string());
    }

    let cookies = headers.get(header::COOKIE).and_then(|v| v.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == GATE_COOKIE).then(|| value.to_string())
    })
}

fn is_exempt(path: &str) -> bool {
    path == "/health" || path == "/metrics" || path == "/access/unlock" || path.starts_with("/v1/")
}

/// Gate middleware. A no-op when no gate is configured.
pub async fn access_gate_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let gate = match &ctx.config.access_gate {
        Some(gate) => gate,
        None => return Ok(next.run(request).await),
    };

    if is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    match token_from_headers(request.headers()) {
        Some(token) if verify_gate_token(gate, &token) => Ok(next.run(request).await),
        _ => Err(StatusCode::FORBIDDEN),
    }
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub token: String,
}

/// POST /access/unlock
pub async fn unlock(
    State(ctx): State<AppContext>,
    Json(body): Json<UnlockRequest>,
) -> AppResult<Response> {
    let gate = ctx
        .config
        .access_gate
        .as_ref()
        .ok_or_else(|| AppError::NotFound("No access gate configured".to_string()))?;

    if !verify_password(&body.password, &gate.password_hash)? {
        return Err(AppError::Authentication("Invalid password".to_string()));
    }

    let token = issue_gate_token(gate)?;
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        GATE_COOKIE, token, gate.token_ttl
    );

    let mut response = Json(UnlockResponse { token }).into_response();
    if let Ok(value) = cookie.parse() {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn gate() -> AccessGateConfig {
        AccessGateConfig {
            password_hash: crate::account::hash_password("letmein").unwrap(),
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            token_ttl: 3600,
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let gate = gate();
        let token = issue_gate_token(&gate).unwrap();
        assert!(verify_gate_token(&gate, &token));
        assert!(!verify_gate_token(&gate, "not-a-token"));
    }

    #[test]
    fn tokens_from_other_secrets_rejected() {
        let gate_a = gate();
        let mut gate_b = gate_a.clone();
        gate_b.token_secret = "fedcba9876543210fedcba9876543210".to_string();

        let token = issue_gate_token(&gate_a).unwrap();
        assert!(!verify_gate_token(&gate_b, &token));
    }

    #[test]
    fn token_lookup_prefers_header_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; pp_access=tok; b=2"));
        assert_eq!(token_from_headers(&headers), Some("tok".to_string()));

        headers.insert("x-access-token", HeaderValue::from_static("direct"));
        assert_eq!(token_from_headers(&headers), Some("direct".to_string()));
    }

    #[test]
    fn exempt_paths() {
        assert!(is_exempt("/health"));
        assert!(is_exempt("/metrics"));
        assert!(is_exempt("/access/unlock"));
        assert!(is_exempt("/v1/prompts"));
        assert!(!is_exempt("/api/prompts"));
    }
}
