use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::stale_presence_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::notification_pruning_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");

            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    crate::metrics::record_background_job("session_cleanup", "ok");
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    crate::metrics::record_background_job("session_cleanup", "error");
                    error!("Failed to cleanup expired sessions: {}", e);
                }
            }
        }
    }

    /// Sweep presence viewers whose heartbeats stopped (runs every minute)
    async fn stale_presence_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            let swept = tasks::sweep_stale_presence(&scheduler.context).await;
            crate::metrics::record_background_job("presence_sweep", "ok");
            if swept > 0 {
                info!("Swept {} stale presence viewers", swept);
            }
        }
    }

    /// Prune old read notifications (runs daily)
    async fn notification_pruning_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            info!("Running notification pruning");

            match tasks::prune_notifications(&scheduler.context).await {
                Ok(count) => {
                    crate::metrics::record_background_job("notification_pruning", "ok");
                    if count > 0 {
                        info!("Pruned {} old notifications", count);
                    }
                }
                Err(e) => {
                    crate::metrics::record_background_job("notification_pruning", "error");
                    error!("Failed to prune notifications: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success
                }
                Err(e) => error!("Health check failed: {}", e),
            }
        }
    }
}
