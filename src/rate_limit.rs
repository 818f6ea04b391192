/// Global request rate limiting
use crate::{
    config::RateLimitConfig,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Process-wide limiter with separate tiers for authenticated and
/// anonymous traffic. Per-API-key limits for /v1 are enforced separately
/// on the key rows.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unauthenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(
            NonZeroU32::new(config.authenticated_rps).unwrap_or(NonZeroU32::new(100).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(50).unwrap()));

        let unauth_quota = Quota::per_second(
            NonZeroU32::new(config.unauthenticated_rps).unwrap_or(NonZeroU32::new(10).unwrap()),
        )
        .allow_burst(
            NonZeroU32::new(config.burst_size / 5).unwrap_or(NonZeroU32::new(10).unwrap()),
        );

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    pub fn check_authenticated(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.authenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(AppError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    pub fn check_unauthenticated(&self) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.unauthenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(AppError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // /v1 traffic is charged against per-key windows instead
    if request.uri().path().starts_with("/v1/") {
        return Ok(next.run(request).await);
    }

    let has_auth_header = request.headers().get("authorization").is_some();

    let result = if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    match result {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::TOO_MANY_REQUESTS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(auth_rps: u32, unauth_rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            authenticated_rps: auth_rps,
            unauthenticated_rps: unauth_rps,
            burst_size: burst,
        }
    }

    #[test]
    fn first_requests_pass() {
        let limiter = RateLimiter::new(&config(100, 10, 50));
        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
    }

    #[test]
    fn burst_limit_enforced() {
        let limiter = RateLimiter::new(&config(10, 5, 5));

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }
        assert!(limiter.check_authenticated().is_err());
    }

    #[test]
    fn disabled_limiter_always_passes() {
        let mut cfg = config(1, 1, 1);
        cfg.enabled = false;
        let limiter = RateLimiter::new(&cfg);

        for _ in 0..100 {
            assert!(limiter.check_authenticated().is_ok());
            assert!(limiter.check_unauthenticated().is_ok());
        }
    }
}
