/// Account management: registration, login, and session validation
mod manager;

pub use manager::{hash_password, verify_password, AccountManager};

/// Session details extracted from a validated access token
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user_id: String,
    pub session_id: String,
    pub handle: String,
}
