/// Likes, bookmarks, and comments
use crate::{
    db::models::{Comment, Prompt},
    error::{is_unique_violation, AppError, AppResult},
    notifications::NotificationManager,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const MAX_COMMENT_LEN: usize = 5_000;

/// Engagement manager service
pub struct EngagementManager {
    db: SqlitePool,
    notifications: NotificationManager,
}

impl EngagementManager {
    pub fn new(db: SqlitePool) -> Self {
        let notifications = NotificationManager::new(db.clone());
        Self { db, notifications }
    }

    /// Like a prompt. The unique constraint is the arbiter: a duplicate
    /// insert surfaces as 400 "Already liked", never a racy pre-check.
    pub async fn like(&self, user_id: &str, prompt_id: &str) -> AppResult<()> {
        let prompt = self.visible_prompt(prompt_id, Some(user_id)).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, prompt_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(prompt_id)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = inserted {
            if is_unique_violation(db_err.as_ref()) {
                return Err(AppError::AlreadyExists("Already liked".to_string()));
            }
        }
        inserted?;

        sqlx::query("UPDATE prompts SET like_count = like_count + 1 WHERE id = ?1")
            .bind(prompt_id)
            .execute(&mut *tx)
            .await?;

        // +2 points to the prompt's author
        sqlx::query(
            "UPDATE user_progress
             SET points = points + 2, likes_received = likes_received + 1, updated_at = ?2
             WHERE user_id = ?1",
        )
        .bind(&prompt.author_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // The like is already committed; a failed notification must not
        // turn it into an error response.
        if prompt.author_id != user_id {
            if let Err(e) = self
                .notifications
                .notify(
                    &prompt.author_id,
                    "like",
                    Some(user_id),
                    Some(prompt_id),
                    "Your prompt was liked",
                )
                .await
            {
                tracing::warn!("Failed to notify author of like: {}", e);
            }
        }

        Ok(())
    }

    /// Remove a like. Idempotent: unliking something never liked is a no-op.
    pub async fn unlike(&self, user_id: &str, prompt_id: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM likes WHERE user_id = ?1 AND prompt_id = ?2")
            .bind(user_id)
            .bind(prompt_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() > 0 {
            sqlx::query(
                "UPDATE prompts SET like_count = MAX(like_count - 1, 0) WHERE id = ?1",
            )
            .bind(prompt_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Whether a user has liked a prompt
    pub async fn has_liked(&self, user_id: &str, prompt_id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM likes WHERE user_id = ?1 AND prompt_id = ?2",
        )
        .bind(user_id)
        .bind(prompt_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    /// Bookmark a prompt. Duplicate bookmarks are rejected like duplicate likes.
    pub async fn bookmark(&self, user_id: &str, prompt_id: &str) -> AppResult<()> {
        self.visible_prompt(prompt_id, Some(user_id)).await?;

        let result = sqlx::query(
            "INSERT INTO bookmarks (user_id, prompt_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(prompt_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result {
            if is_unique_violation(db_err.as_ref()) {
                return Err(AppError::AlreadyExists("Already bookmarked".to_string()));
            }
        }
        result?;

        Ok(())
    }

    /// Remove a bookmark. Idempotent.
    pub async fn unbookmark(&self, user_id: &str, prompt_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM bookmarks WHERE user_id = ?1 AND prompt_id = ?2")
            .bind(user_id)
            .bind(prompt_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Prompts a user has bookmarked, newest bookmark first
    pub async fn bookmarked_prompts(&self, user_id: &str) -> AppResult<Vec<Prompt>> {
        let prompts = sqlx::query_as::<_, Prompt>(
            "SELECT p.* FROM prompts p
             JOIN bookmarks b ON b.prompt_id = p.id
             WHERE b.user_id = ?1
             ORDER BY b.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prompts)
    }

    /// Prompts a user has liked, newest like first
    pub async fn liked_prompts(&self, user_id: &str) -> AppResult<Vec<Prompt>> {
        let prompts = sqlx::query_as::<_, Prompt>(
            "SELECT p.* FROM prompts p
             JOIN likes l ON l.prompt_id = p.id
             WHERE l.user_id = ?1
             ORDER BY l.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prompts)
    }

    /// Add a comment and notify the prompt's author
    pub async fn comment(
        &self,
        user_id: &str,
        prompt_id: &str,
        body: &str,
    ) -> AppResult<Comment> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }
        if body.len() > MAX_COMMENT_LEN {
            return Err(AppError::Validation(format!(
                "Comment exceeds {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let prompt = self.visible_prompt(prompt_id, Some(user_id)).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO comments (id, prompt_id, author_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(prompt_id)
        .bind(user_id)
        .bind(body)
        .bind(now)
        .execute(&self.db)
        .await?;

        if prompt.author_id != user_id {
            if let Err(e) = self
                .notifications
                .notify(
                    &prompt.author_id,
                    "comment",
                    Some(user_id),
                    Some(prompt_id),
                    "New comment on your prompt",
                )
                .await
            {
                tracing::warn!("Failed to notify author of comment: {}", e);
            }
        }

        Ok(Comment {
            id,
            prompt_id: prompt_id.to_string(),
            author_id: user_id.to_string(),
            body: body.to_string(),
            created_at: now,
        })
    }

    /// List comments on a prompt, oldest first. Comments on a private
    /// prompt are as hidden as the prompt itself.
    pub async fn list_comments(
        &self,
        prompt_id: &str,
        viewer: Option<&str>,
    ) -> AppResult<Vec<Comment>> {
        self.visible_prompt(prompt_id, viewer).await?;
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE prompt_id = ?1 ORDER BY created_at ASC",
        )
        .bind(prompt_id)
        .fetch_all(&self.db)
        .await?;
        Ok(comments)
    }

    /// Delete a comment. Allowed for the comment author or the prompt author.
    pub async fn delete_comment(&self, comment_id: &str, user_id: &str) -> AppResult<()> {
        let comment =
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?1")
                .bind(comment_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        if comment.author_id != user_id {
            let prompt_author: Option<String> =
                sqlx::query_scalar("SELECT author_id FROM prompts WHERE id = ?1")
                    .bind(&comment.prompt_id)
                    .fetch_optional(&self.db)
                    .await?;
            if prompt_author.as_deref() != Some(user_id) {
                return Err(AppError::Authorization(
                    "Not allowed to delete this comment".to_string(),
                ));
            }
        }

        sqlx::query("DELETE FROM comments WHERE id = ?1")
            .bind(comment_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn visible_prompt(&self, prompt_id: &str, viewer: Option<&str>) -> AppResult<Prompt> {
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
}
