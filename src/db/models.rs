/// Database row models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub handle: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Session record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Prompt record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    /// Comma-separated tag list
    pub tags: String,
    pub is_public: bool,
    pub like_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    /// Tags as a vector, trimmed and non-empty
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Immutable snapshot of a prompt at a version number
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: String,
    pub prompt_id: String,
    pub version_number: i64,
    pub title: String,
    pub body: String,
    pub tags: String,
    pub edited_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fork edge linking an original prompt to its derivative
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Fork {
    pub id: String,
    pub original_prompt_id: String,
    pub forked_prompt_id: String,
    pub created_at: DateTime<Utc>,
}

/// Comment on a prompt
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub prompt_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Collection of prompts owned by a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// API key record. The secret itself is never stored, only its digest.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// First characters of the secret, shown in listings
    pub key_prefix: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub request_count: i64,
    pub rate_limit_per_minute: i64,
    pub window_started_at: Option<DateTime<Utc>>,
    pub window_request_count: i64,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Notification record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub actor_id: Option<String>,
    pub prompt_id: Option<String>,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Team record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Team membership record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// Challenge record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Gamification counters for a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub points: i64,
    pub prompts_created: i64,
    pub likes_received: i64,
    pub forks_received: i64,
    pub updated_at: DateTime<Utc>,
}
