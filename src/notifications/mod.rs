/// Notification storage and delivery
use crate::{
    db::models::Notification,
    error::{AppError, AppResult},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Read notifications older than this are pruned by the background job
const PRUNE_AFTER_DAYS: i64 = 30;

/// Notification manager service
#[derive(Clone)]
pub struct NotificationManager {
    db: SqlitePool,
}

impl NotificationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a notification for a user
    pub async fn notify(
        &self,
        user_id: &str,
        kind: &str,
        actor_id: Option<&str>,
        prompt_id: Option<&str>,
        body: &str,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, actor_id, prompt_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(kind)
        .bind(actor_id)
        .bind(prompt_id)
        .bind(body)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Notification {
            id,
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            actor_id: actor_id.map(String::from),
            prompt_id: prompt_id.map(String::from),
            body: body.to_string(),
            read_at: None,
            created_at: now,
        })
    }

    /// List a user's notifications, unread first, newest within each group
    pub async fn list(&self, user_id: &str, limit: i64) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = ?1
             ORDER BY (read_at IS NULL) DESC, created_at DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.db)
        .await?;
        Ok(notifications)
    }

    /// Count unread notifications
    pub async fn unread_count(&self, user_id: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    /// Mark one notification as read. Owner-only.
    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ?3 WHERE id = ?1 AND user_id = ?2 AND read_at IS NULL",
        )
        .bind(notification_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // Either missing, someone else's, or already read; only the first
            // two are errors worth surfacing
            let exists: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM notifications WHERE id = ?1 AND user_id = ?2",
            )
            .bind(notification_id)
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
            if exists == 0 {
                return Err(AppError::NotFound("Notification not found".to_string()));
            }
        }

        Ok(())
    }

    /// Mark all of a user's notifications as read. Returns rows updated.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ?2 WHERE user_id = ?1 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete read notifications past the retention window. Returns rows removed.
    pub async fn prune_old(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::days(PRUNE_AFTER_DAYS);
        let result = sqlx::query(
            "DELETE FROM notifications WHERE read_at IS NOT NULL AND created_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};

    #[tokio::test]
    async fn notify_list_and_read_flow() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "user").await;
        let actor = seed_user(&pool, "actor").await;
        let mgr = NotificationManager::new(pool);

        let n1 = mgr
            .notify(&user, "like", Some(&actor), None, "Someone liked your prompt")
            .await
            .unwrap();
        mgr.notify(&user, "comment", Some(&actor), None, "New comment")
            .await
            .unwrap();

        assert_eq!(mgr.unread_count(&user).await.unwrap(), 2);

        mgr.mark_read(&n1.id, &user).await.unwrap();
        assert_eq!(mgr.unread_count(&user).await.unwrap(), 1);

        mgr.mark_all_read(&user).await.unwrap();
        assert_eq!(mgr.unread_count(&user).await.unwrap(), 0);

        let all = mgr.list(&user, 50).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn mark_read_rejects_foreign_notification() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "user").await;
        let other = seed_user(&pool, "other").await;
        let mgr = NotificationManager::new(pool);

        let n = mgr.notify(&user, "like", None, None, "hi").await.unwrap();
        let err = mgr.mark_read(&n.id, &other).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn mark_read_idempotent() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "user").await;
        let mgr = NotificationManager::new(pool);

        let n = mgr.notify(&user, "like", None, None, "hi").await.unwrap();
        mgr.mark_read(&n.id, &user).await.unwrap();
        mgr.mark_read(&n.id, &user).await.unwrap();
    }

    #[tokio::test]
    async fn prune_removes_only_old_read_rows() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "user").await;
        let mgr = NotificationManager::new(pool.clone());

        let n = mgr.notify(&user, "like", None, None, "old").await.unwrap();
        mgr.mark_read(&n.id, &user).await.unwrap();

        // Age the row past the retention window
        let old = Utc::now() - Duration::days(PRUNE_AFTER_DAYS + 1);
        sqlx::query("UPDATE notifications SET created_at = ?1 WHERE id = ?2")
            .bind(old)
            .bind(&n.id)
            .execute(&pool)
            .await
            .unwrap();

        mgr.notify(&user, "like", None, None, "fresh").await.unwrap();

        assert_eq!(mgr.prune_old().await.unwrap(), 1);
        assert_eq!(mgr.list(&user, 10).await.unwrap().len(), 1);
    }
}
