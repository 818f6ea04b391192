/// Version history: immutable snapshots and author-only restore
use crate::{
    db::models::{Prompt, PromptVersion},
    error::{AppError, AppResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Version manager service
pub struct VersionManager {
    db: SqlitePool,
}

impl VersionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// List a prompt's versions, newest first
    pub async fn list(&self, prompt_id: &str) -> AppResult<Vec<PromptVersion>> {
        let versions = sqlx::query_as::<_, PromptVersion>(
            "SELECT * FROM prompt_versions WHERE prompt_id = ?1 ORDER BY version_number DESC",
        )
        .bind(prompt_id)
        .fetch_all(&self.db)
        .await?;
        Ok(versions)
    }

    /// Fetch a single version
    pub async fn get(&self, prompt_id: &str, version_number: i64) -> AppResult<PromptVersion> {
        sqlx::query_as::<_, PromptVersion>(
            "SELECT * FROM prompt_versions WHERE prompt_id = ?1 AND version_number = ?2",
        )
        .bind(prompt_id)
        .bind(version_number)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Version {} of prompt {} not found",
                version_number, prompt_id
            ))
        })
    }

    /// Restore a version onto the live prompt. Author-only.
    ///
    /// The pre-restore content is snapshotted first, so history only ever
    /// grows: restoring never discards a version.
    pub async fn restore(
        &self,
        prompt_id: &str,
        version_number: i64,
        user_id: &str,
    ) -> AppResult<Prompt> {
        let prompt = sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE id = ?1")
            .bind(prompt_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {}", prompt_id)))?;

        if prompt.author_id != user_id {
            return Err(AppError::Authorization(
                "Only the author may restore versions".to_string(),
            ));
        }

        let snapshot = self.get(prompt_id, version_number).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

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
        .bind(&prompt.title)
        .bind(&prompt.body)
        .bind(&prompt.tags)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE prompts SET title = ?2, body = ?3, tags = ?4, updated_at = ?5 WHERE id = ?1",
        )
        .bind(prompt_id)
        .bind(&snapshot.title)
        .bind(&snapshot.body)
        .bind(&snapshot.tags)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Prompt {
            title: snapshot.title,
            body: snapshot.body,
            tags: snapshot.tags,
            updated_at: now,
            ..prompt
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};
    use crate::prompts::{NewPrompt, PromptStore, PromptUpdate};

    async fn setup() -> (VersionManager, PromptStore, SqlitePool, String, String) {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let other = seed_user(&pool, "other").await;
        (
            VersionManager::new(pool.clone()),
            PromptStore::new(pool.clone()),
            pool,
            author,
            other,
        )
    }

    async fn prompt_with_history(store: &PromptStore, author: &str) -> String {
        let prompt = store
            .create(
                author,
                NewPrompt {
                    title: "Original title".to_string(),
                    body: "Original body".to_string(),
                    tags: vec![],
                    is_public: true,
                },
            )
            .await
            .unwrap();

        store
            .update(
                &prompt.id,
                author,
                PromptUpdate {
                    title: Some("Edited title".to_string()),
                    body: Some("Edited body".to_string()),
                    save_version: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        prompt.id
    }

    #[tokio::test]
    async fn restore_copies_snapshot_and_grows_history() {
        let (versions, store, _pool, author, _) = setup().await;
        let prompt_id = prompt_with_history(&store, &author).await;

        // Version 1 holds the original content
        let restored = versions.restore(&prompt_id, 1, &author).await.unwrap();
        assert_eq!(restored.title, "Original title");
        assert_eq!(restored.body, "Original body");

        // History grew: v1 (original) + v2 (pre-restore edit)
        let all = versions.list(&prompt_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version_number, 2);
        assert_eq!(all[0].title, "Edited title");
    }

    #[tokio::test]
    async fn restore_by_non_author_forbidden() {
        let (versions, store, _pool, author, other) = setup().await;
        let prompt_id = prompt_with_history(&store, &author).await;

        let err = versions.restore(&prompt_id, 1, &other).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn restore_missing_version_not_found() {
        let (versions, store, _pool, author, _) = setup().await;
        let prompt_id = prompt_with_history(&store, &author).await;

        let err = versions.restore(&prompt_id, 99, &author).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
