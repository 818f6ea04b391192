/// Application context and dependency injection
use crate::{
    account::AccountManager,
    api_keys::ApiKeyManager,
    collections::CollectionManager,
    config::ServerConfig,
    db,
    engagement::EngagementManager,
    error::{AppError, AppResult},
    gamification::GamificationManager,
    mailer::Mailer,
    notifications::NotificationManager,
    presence::PresenceTracker,
    prompts::{ForkManager, PromptStore, VersionManager},
    rate_limit::RateLimiter,
    teams::TeamManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub prompt_store: Arc<PromptStore>,
    pub version_manager: Arc<VersionManager>,
    pub fork_manager: Arc<ForkManager>,
    pub engagement_manager: Arc<EngagementManager>,
    pub collection_manager: Arc<CollectionManager>,
    pub api_key_manager: Arc<ApiKeyManager>,
    pub notification_manager: Arc<NotificationManager>,
    pub team_manager: Arc<TeamManager>,
    pub gamification_manager: Arc<GamificationManager>,
    pub presence: Arc<PresenceTracker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let config = Arc::new(config);

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self::assemble(config, pool, rate_limiter, mailer))
    }

    fn assemble(
        config: Arc<ServerConfig>,
        pool: SqlitePool,
        rate_limiter: Arc<RateLimiter>,
        mailer: Arc<Mailer>,
    ) -> Self {
        let account_manager = Arc::new(AccountManager::new(pool.clone(), Arc::clone(&config)));
        let prompt_store = Arc::new(PromptStore::new(pool.clone()));
        let version_manager = Arc::new(VersionManager::new(pool.clone()));
        let fork_manager = Arc::new(ForkManager::new(pool.clone()));
        let engagement_manager = Arc::new(EngagementManager::new(pool.clone()));
        let collection_manager = Arc::new(CollectionManager::new(pool.clone()));
        let api_key_manager = Arc::new(ApiKeyManager::new(pool.clone(), Arc::clone(&config)));
        let notification_manager = Arc::new(NotificationManager::new(pool.clone()));
        let team_manager = Arc::new(TeamManager::new(pool.clone()));
        let gamification_manager = Arc::new(GamificationManager::new(pool.clone()));
        let presence = Arc::new(PresenceTracker::new());

        Self {
            config,
            db: pool,
            account_manager,
            prompt_store,
            version_manager,
            fork_manager,
            engagement_manager,
            collection_manager,
            api_key_manager,
            notification_manager,
            team_manager,
            gamification_manager,
            presence,
            rate_limiter,
            mailer,
        }
    }

    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory)
            .await
            .map_err(AppError::Io)?;
        Ok(())
    }

    /// Context over an already-migrated pool, for tests
    #[cfg(test)]
    pub fn for_pool(pool: SqlitePool, config: Arc<ServerConfig>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let mailer = Arc::new(Mailer::new(None).unwrap());
        Self::assemble(config, pool, rate_limiter, mailer)
    }
}
