/// Prompt CRUD and feed queries
use crate::{
    db::models::Prompt,
    error::{AppError, AppResult},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 50_000;
const MAX_TAGS: usize = 10;

/// Fields for creating a prompt
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrompt {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

/// Fields for updating a prompt. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    /// Snapshot the previous content into version history before applying
    #[serde(default)]
    pub save_version: bool,
}

/// Feed query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Cursor: `<rfc3339 created_at>|<id>` of the last prompt on the
    /// previous page. The id tie-breaks prompts sharing a timestamp.
    pub cursor: Option<String>,
}

fn default_limit() -> i64 {
    25
}

/// One page of the prompt feed
#[derive(Debug, Serialize)]
pub struct PromptFeedPage {
    pub prompts: Vec<Prompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Prompt store service
pub struct PromptStore {
    db: SqlitePool,
}

impl PromptStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a prompt and bump the author's gamification counters
    pub async fn create(&self, author_id: &str, new: NewPrompt) -> AppResult<Prompt> {
        validate_content(&new.title, &new.body, &new.tags)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let tags = join_tags(&new.tags);

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO prompts (id, author_id, title, body, tags, is_public, like_count, view_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?7)",
        )
        .bind(&id)
        .bind(author_id)
        .bind(&new.title)
        .bind(&new.body)
        .bind(&tags)
        .bind(new.is_public)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // +10 points for publishing
        sqlx::query(
            "UPDATE user_progress
             SET points = points + 10, prompts_created = prompts_created + 1, updated_at = ?2
             WHERE user_id = ?1",
        )
        .bind(author_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Prompt {
            id,
            author_id: author_id.to_string(),
            title: new.title,
            body: new.body,
            tags,
            is_public: new.is_public,
            like_count: 0,
            view_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a prompt visible to the given viewer. Private prompts are only
    /// visible to their author and otherwise read as missing.
    pub async fn get_visible(&self, prompt_id: &str, viewer: Option<&str>) -> AppResult<Prompt> {
        let prompt = sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE id = ?1")
            .bind(prompt_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {}", prompt_id)))?;

        if !prompt.is_public && viewer != Some(prompt.author_id.as_str()) {
            return Err(AppError::NotFound(format!("Prompt not found: {}", prompt_id)));
        }

        Ok(prompt)
    }

    /// Fetch a prompt without visibility filtering (internal use)
    pub async fn get(&self, prompt_id: &str) -> AppResult<Prompt> {
        sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE id = ?1")
            .bind(prompt_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {}", prompt_id)))
    }

    /// Public feed, newest first, keyset-paginated on (created_at, id).
    /// The id tie-break keeps prompts sharing a timestamp from being
    /// skipped between pages.
    pub async fn list(&self, query: &PromptQuery) -> AppResult<PromptFeedPage> {
        let limit = query.limit.clamp(1, 100);

        // Cursor timestamp is bound as a datetime so it compares against
        // created_at in the same encoding sqlx used to store it.
        let (cursor_ts, cursor_id) = match &query.cursor {
            Some(raw) => {
                let (ts, id) = raw
                    .split_once('|')
                    .ok_or_else(|| AppError::Validation("Invalid cursor".to_string()))?;
                let ts = chrono::DateTime::parse_from_rfc3339(ts)
                    .map_err(|_| AppError::Validation("Invalid cursor".to_string()))?
                    .with_timezone(&chrono::Utc);
                (Some(ts), Some(id.to_string()))
            }
            None => (None, None),
        };
        let tag_pattern = query.tag.as_ref().map(|t| format!("%,{},%", t.trim()));

        // Fetch limit + 1 to determine if there are more rows
        let rows = sqlx::query_as::<_, Prompt>(
            "SELECT * FROM prompts WHERE is_public = 1
               AND (?1 IS NULL OR created_at < ?1 OR (created_at = ?1 AND id < ?5))
               AND (?3 IS NULL OR (',' || tags || ',') LIKE ?3)
               AND (?4 IS NULL OR author_id = ?4)
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .bind(cursor_ts)
        .bind(limit + 1)
        .bind(&tag_pattern)
        .bind(&query.author)
        .bind(&cursor_id)
        .fetch_all(&self.db)
        .await?;

        let has_more = rows.len() as i64 > limit;
        let mut prompts = rows;
        prompts.truncate(limit as usize);

        let cursor = if has_more {
            prompts
                .last()
                .map(|p| format!("{}|{}", p.created_at.to_rfc3339(), p.id))
        } else {
            None
        };

        Ok(PromptFeedPage { prompts, cursor })
    }

    /// Prompts owned by a user, including private ones
    pub async fn list_owned(&self, author_id: &str) -> AppResult<Vec<Prompt>> {
        let prompts = sqlx::query_as::<_, Prompt>(
            "SELECT * FROM prompts WHERE author_id = ?1 ORDER BY created_at DESC",
        )
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prompts)
    }

    /// Apply an update. Author-only. Returns the updated prompt.
    /// When `save_version` is set the pre-update content is snapshotted first.
    pub async fn update(
        &self,
        prompt_id: &str,
        editor_id: &str,
        update: PromptUpdate,
    ) -> AppResult<Prompt> {
        let current = self.get(prompt_id).await?;
        if current.author_id != editor_id {
            return Err(AppError::Authorization(
                "Only the author may edit this prompt".to_string(),
            ));
        }

        let title = update.title.unwrap_or_else(|| current.title.clone());
        let body = update.body.unwrap_or_else(|| current.body.clone());
        let tags = update
            .tags
            .map(|t| join_tags(&t))
            .unwrap_or_else(|| current.tags.clone());
        let is_public = update.is_public.unwrap_or(current.is_public);

        let tag_list: Vec<String> = tags.split(',').map(String::from).collect();
        validate_content(&title, &body, &tag_list)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if update.save_version {
            let next: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(version_number), 0) + 1 FROM prompt_versions WHERE prompt_id = ?1",
            )
            .bind(prompt_id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO prompt_versions (id, prompt_id, version_number, title, body, tags, edited_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(prompt_id)
            .bind(next)
            .bind(&current.title)
            .bind(&current.body)
            .bind(&current.tags)
            .bind(editor_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE prompts SET title = ?2, body = ?3, tags = ?4, is_public = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(prompt_id)
        .bind(&title)
        .bind(&body)
        .bind(&tags)
        .bind(is_public)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Prompt {
            title,
            body,
            tags,
            is_public,
            updated_at: now,
            ..current
        })
    }

    /// Delete a prompt. Author-only. Versions, likes, comments, bookmarks,
    /// collection items, and fork edges go with it via FK cascade.
    pub async fn delete(&self, prompt_id: &str, user_id: &str) -> AppResult<()> {
        let prompt = self.get(prompt_id).await?;
        if prompt.author_id != user_id {
            return Err(AppError::Authorization(
                "Only the author may delete this prompt".to_string(),
            ));
        }

        sqlx::query("DELETE FROM prompts WHERE id = ?1")
            .bind(prompt_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Bump the view counter
    pub async fn record_view(&self, prompt_id: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE prompts SET view_count = view_count + 1 WHERE id = ?1")
            .bind(prompt_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Prompt not found: {}", prompt_id)));
        }
        Ok(())
    }
}

fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn validate_content(title: &str, body: &str, tags: &[String]) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    if body.trim().is_empty() {
        return Err(AppError::Validation("Body cannot be empty".to_string()));
    }
    if body.len() > MAX_BODY_LEN {
        return Err(AppError::Validation(format!(
            "Body exceeds {} characters",
            MAX_BODY_LEN
        )));
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "At most {} tags allowed",
            MAX_TAGS
        )));
    }
    Ok(())
}
