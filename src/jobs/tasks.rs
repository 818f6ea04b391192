/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> AppResult<u64> {
    ctx.account_manager.cleanup_expired_sessions().await
}

/// Drop presence viewers whose heartbeats stopped arriving
pub async fn sweep_stale_presence(ctx: &AppContext) -> u64 {
    ctx.presence
        .sweep_stale(ctx.config.presence.stale_after_secs)
        .await
}

/// Prune read notifications past the retention window
pub async fn prune_notifications(ctx: &AppContext) -> AppResult<u64> {
    ctx.notification_manager.prune_old().await
}

/// Health check: verify database connectivity
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
