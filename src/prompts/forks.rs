/// Fork (remix) edges and the remix tree
use crate::{
    db::models::{Fork, Prompt},
    error::{AppError, AppResult},
    notifications::NotificationManager,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Maximum depth the remix tree walk will descend
pub const DEFAULT_REMIX_DEPTH_CAP: usize = 10;

/// Node in the remix tree
#[derive(Debug, Serialize)]
pub struct RemixNode {
    pub prompt_id: String,
    pub title: String,
    pub author_id: String,
    pub like_count: i64,
    pub children: Vec<RemixNode>,
    /// True when children exist below the depth cap and were not expanded
    pub truncated: bool,
}

/// Fork manager service
pub struct ForkManager {
    db: SqlitePool,
    notifications: NotificationManager,
}

impl ForkManager {
    pub fn new(db: SqlitePool) -> Self {
        let notifications = NotificationManager::new(db.clone());
        Self { db, notifications }
    }

    /// Fork a visible prompt: clone it as a new prompt owned by the forker
    /// and record the edge. The original author is notified and credited.
    pub async fn fork(&self, original_id: &str, user_id: &str) -> AppResult<Prompt> {
        let original = self.visible_prompt(original_id, Some(user_id)).await?;

        let forked_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let title = format!("{} (remix)", original.title);

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO prompts (id, author_id, title, body, tags, is_public, like_count, view_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?7)",
        )
        .bind(&forked_id)
        .bind(user_id)
        .bind(&title)
        .bind(&original.body)
        .bind(&original.tags)
        .bind(original.is_public)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO forks (id, original_prompt_id, forked_prompt_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(original_id)
        .bind(&forked_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE user_progress
             SET points = points + 5, forks_received = forks_received + 1, updated_at = ?2
             WHERE user_id = ?1",
        )
        .bind(&original.author_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // The fork is already committed; a failed notification must not
        // turn it into an error response.
        if original.author_id != user_id {
            if let Err(e) = self
                .notifications
                .notify(
                    &original.author_id,
                    "fork",
                    Some(user_id),
                    Some(original_id),
                    "Your prompt was remixed",
                )
                .await
            {
                tracing::warn!("Failed to notify author of fork: {}", e);
            }
        }

        Ok(Prompt {
            id: forked_id,
            author_id: user_id.to_string(),
            title,
            body: original.body,
            tags: original.tags,
            is_public: original.is_public,
            like_count: 0,
            view_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Build the remix tree rooted at a prompt visible to the viewer.
    /// A private root reads as missing to everyone but its author.
    ///
    /// The walk carries a depth cap and a visited set: a cyclic or
    /// adversarially deep fork chain terminates instead of recursing
    /// without bound. Nodes with children below the cap are marked
    /// `truncated`.
    pub async fn remix_tree(
        &self,
        root_id: &str,
        viewer: Option<&str>,
        depth_cap: usize,
    ) -> AppResult<RemixNode> {
        let root = self.visible_prompt(root_id, viewer).await?;

        let mut visited = HashSet::new();
        visited.insert(root.id.clone());

        let mut node = RemixNode {
            prompt_id: root.id,
            title: root.title,
            author_id: root.author_id,
            like_count: root.like_count,
            children: Vec::new(),
            truncated: false,
        };
        self.expand(&mut node, &mut visited, depth_cap).await?;

        Ok(node)
    }

    /// Direct children of a prompt, public ones only
    async fn children_of(&self, prompt_id: &str) -> AppResult<Vec<Prompt>> {
        let children = sqlx::query_as::<_, Prompt>(
            "SELECT p.* FROM prompts p
             JOIN forks f ON f.forked_prompt_id = p.id
             WHERE f.original_prompt_id = ?1 AND p.is_public = 1
             ORDER BY p.created_at ASC",
        )
        .bind(prompt_id)
        .fetch_all(&self.db)
        .await?;
        Ok(children)
    }

    /// Iterative depth-first expansion. Recursion over async fetches would
    /// need boxing at every level; an explicit stack keeps the walk flat.
    async fn expand(
        &self,
        root: &mut RemixNode,
        visited: &mut HashSet<String>,
        depth_cap: usize,
    ) -> AppResult<()> {
        // Stack of (path from root, remaining depth)
        let mut stack: Vec<(Vec<usize>, usize)> = vec![(Vec::new(), depth_cap)];

        while let Some((path, remaining)) = stack.pop() {
            let parent_id = {
                let node = node_at_mut(root, &path);
                node.prompt_id.clone()
            };

            let children = self.children_of(&parent_id).await?;

            if remaining == 0 {
                if !children.is_empty() {
                    node_at_mut(root, &path).truncated = true;
                }
                continue;
            }

            for child in children {
                if !visited.insert(child.id.clone()) {
                    // Cycle in the edge list; skip the repeated node
                    tracing::warn!("Cycle detected in fork graph at prompt {}", child.id);
                    continue;
                }

                let node = node_at_mut(root, &path);
                node.children.push(RemixNode {
                    prompt_id: child.id,
                    title: child.title,
                    author_id: child.author_id,
                    like_count: child.like_count,
                    children: Vec::new(),
                    truncated: false,
                });

                let mut child_path = path.clone();
                child_path.push(node.children.len() - 1);
                stack.push((child_path, remaining - 1));
            }
        }

        Ok(())
    }

    /// The fork edge pointing at a prompt, if it is itself a remix.
    /// Gated on the prompt's visibility like any other read.
    pub async fn parent_edge(&self, prompt_id: &str, viewer: Option<&str>) -> AppResult<Option<Fork>> {
        self.visible_prompt(prompt_id, viewer).await?;
        let edge = sqlx::query_as::<_, Fork>("SELECT * FROM forks WHERE forked_prompt_id = ?1")
            .bind(prompt_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(edge)
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

/// Walk an index path from the root to a node
fn node_at_mut<'a>(root: &'a mut RemixNode, path: &[usize]) -> &'a mut RemixNode {
    let mut node = root;
    for &idx in path {
        node = &mut node.children[idx];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};
    use crate::prompts::{NewPrompt, PromptStore};

    async fn setup() -> (ForkManager, PromptStore, SqlitePool, String, String) {
        let pool = test_pool().await;
        let author = seed_user(&pool, "author").await;
        let remixer = seed_user(&pool, "remixer").await;
        (
            ForkManager::new(pool.clone()),
            PromptStore::new(pool.clone()),
            pool,
            author,
            remixer,
        )
    }

    async fn create_prompt(store: &PromptStore, author: &str, title: &str) -> String {
        store
            .create(
                author,
                NewPrompt {
                    title: title.to_string(),
                    body: "body".to_string(),
                    tags: vec![],
                    is_public: true,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn fork_clones_and_credits_author() {
        let (forks, store, pool, author, remixer) = setup().await;
        let original = create_prompt(&store, &author, "Seed").await;

        let fork = forks.fork(&original, &remixer).await.unwrap();
        assert_eq!(fork.author_id, remixer);
        assert_eq!(fork.title, "Seed (remix)");

        let forks_received: i64 =
            sqlx::query_scalar("SELECT forks_received FROM user_progress WHERE user_id = ?1")
                .bind(&author)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(forks_received, 1);

        // Original author got a notification
        let notif_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?1")
                .bind(&author)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(notif_count, 1);
    }

    #[tokio::test]
    async fn fork_of_private_prompt_hidden() {
        let (forks, store, _pool, author, remixer) = setup().await;
        let prompt = store
            .create(
                &author,
                NewPrompt {
                    title: "Hidden".to_string(),
                    body: "body".to_string(),
                    tags: vec![],
                    is_public: false,
                },
            )
            .await
            .unwrap();

        let err = forks.fork(&prompt.id, &remixer).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn remix_tree_nests_descendants() {
        let (forks, store, _pool, author, remixer) = setup().await;
        let root = create_prompt(&store, &author, "Root").await;

        let child = forks.fork(&root, &remixer).await.unwrap();
        let _grandchild = forks.fork(&child.id, &author).await.unwrap();
        let _child2 = forks.fork(&root, &author).await.unwrap();

        let tree = forks
            .remix_tree(&root, None, DEFAULT_REMIX_DEPTH_CAP)
            .await
            .unwrap();
        assert_eq!(tree.children.len(), 2);
        let deep = tree
            .children
            .iter()
            .find(|c| c.prompt_id == child.id)
            .unwrap();
        assert_eq!(deep.children.len(), 1);
    }

    #[tokio::test]
    async fn remix_tree_of_private_prompt_hidden() {
        let (forks, store, _pool, author, remixer) = setup().await;
        let prompt = store
            .create(
                &author,
                NewPrompt {
                    title: "Top secret".to_string(),
                    body: "body".to_string(),
                    tags: vec![],
                    is_public: false,
                },
            )
            .await
            .unwrap();

        // Anonymous and non-author viewers read the root as missing
        let err = forks
            .remix_tree(&prompt.id, None, DEFAULT_REMIX_DEPTH_CAP)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = forks
            .remix_tree(&prompt.id, Some(&remixer), DEFAULT_REMIX_DEPTH_CAP)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let tree = forks
            .remix_tree(&prompt.id, Some(&author), DEFAULT_REMIX_DEPTH_CAP)
            .await
            .unwrap();
        assert_eq!(tree.title, "Top secret");
    }

    #[tokio::test]
    async fn parent_edge_of_private_prompt_hidden() {
        let (forks, store, pool, author, remixer) = setup().await;
        let root = create_prompt(&store, &author, "Root").await;
        let child = forks.fork(&root, &author).await.unwrap();

        // Make the fork private after the fact
        sqlx::query("UPDATE prompts SET is_public = 0 WHERE id = ?1")
            .bind(&child.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = forks.parent_edge(&child.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = forks.parent_edge(&child.id, Some(&remixer)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let edge = forks.parent_edge(&child.id, Some(&author)).await.unwrap();
        assert_eq!(edge.unwrap().original_prompt_id, root);
    }

    #[tokio::test]
    async fn remix_tree_honors_depth_cap() {
        let (forks, store, _pool, author, remixer) = setup().await;
        let root = create_prompt(&store, &author, "Chain").await;

        let mut current = root.clone();
        for i in 0..4 {
            let who = if i % 2 == 0 { &remixer } else { &author };
            current = forks.fork(&current, who).await.unwrap().id;
        }

        let tree = forks.remix_tree(&root, None, 2).await.unwrap();
        // Depth 2: child and grandchild expanded, grandchild marked truncated
        let child = &tree.children[0];
        let grandchild = &child.children[0];
        assert!(grandchild.truncated);
        assert!(grandchild.children.is_empty());
    }

    #[tokio::test]
    async fn remix_tree_terminates_on_cycle() {
        let (forks, store, pool, author, remixer) = setup().await;
        let a = create_prompt(&store, &author, "A").await;
        let b = forks.fork(&a, &remixer).await.unwrap().id;

        // Manufacture a cyclic edge b -> a directly; the application never
        // writes one, but the walk must survive it.
        sqlx::query(
            "INSERT INTO forks (id, original_prompt_id, forked_prompt_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&b)
        .bind(&a)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let tree = forks
            .remix_tree(&a, None, DEFAULT_REMIX_DEPTH_CAP)
            .await
            .unwrap();
        assert_eq!(tree.children.len(), 1);
        // b's only child is a, already visited, so it is skipped
        assert!(tree.children[0].children.is_empty());
    }
}
