/// API routes and handlers
pub mod account;
pub mod collections;
pub mod cron;
pub mod engagement;
pub mod gamification;
pub mod health;
pub mod keys;
pub mod notifications;
pub mod presence;
pub mod prompts;
pub mod teams;
pub mod v1;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(account::routes())
        .merge(prompts::routes())
        .merge(engagement::routes())
        .merge(collections::routes())
        .merge(keys::routes())
        .merge(notifications::routes())
        .merge(teams::routes())
        .merge(gamification::routes())
        .merge(presence::routes())
        .merge(v1::routes())
        .merge(cron::routes())
}
