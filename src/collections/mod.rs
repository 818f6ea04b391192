/// Prompt collections
use crate::{
    db::models::{Collection, Prompt},
    error::{is_unique_violation, AppError, AppResult},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fields for creating or updating a collection
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

/// Collection manager service
pub struct CollectionManager {
    db: SqlitePool,
}

impl CollectionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: &str, input: CollectionInput) -> AppResult<Collection> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO collections (id, owner_id, name, description, is_public, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_public)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Collection {
            id,
            owner_id: owner_id.to_string(),
            name: input.name,
            description: input.description,
            is_public: input.is_public,
            created_at: now,
        })
    }

    /// Fetch a collection visible to the viewer. Private collections read as
    /// missing for anyone but their owner.
    pub async fn get_visible(
        &self,
        collection_id: &str,
        viewer: Option<&str>,
    ) -> AppResult<Collection> {
        let collection =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?1")
                .bind(collection_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

        if !collection.is_public && viewer != Some(collection.owner_id.as_str()) {
            return Err(AppError::NotFound("Collection not found".to_string()));
        }

        Ok(collection)
    }

    /// Collections owned by a user
    pub async fn list_owned(&self, owner_id: &str) -> AppResult<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>(
            "SELECT * FROM collections WHERE owner_id = ?1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(collections)
    }

    pub async fn update(
        &self,
        collection_id: &str,
        owner_id: &str,
        input: CollectionInput,
    ) -> AppResult<Collection> {
        let mut collection = self.owned(collection_id, owner_id).await?;

        if input.name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }

        sqlx::query(
            "UPDATE collections SET name = ?2, description = ?3, is_public = ?4 WHERE id = ?1",
        )
        .bind(collection_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_public)
        .execute(&self.db)
        .await?;

        collection.name = input.name;
        collection.description = input.description;
        collection.is_public = input.is_public;
        Ok(collection)
    }

    pub async fn delete(&self, collection_id: &str, owner_id: &str) -> AppResult<()> {
        self.owned(collection_id, owner_id).await?;
        sqlx::query("DELETE FROM collections WHERE id = ?1")
            .bind(collection_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Add a prompt to a collection. Duplicate adds conflict.
    pub async fn add_item(
        &self,
        collection_id: &str,
        prompt_id: &str,
        owner_id: &str,
    ) -> AppResult<()> {
        self.owned(collection_id, owner_id).await?;

        // The prompt must exist and be visible to the collection owner
        let prompt = sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE id = ?1")
            .bind(prompt_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {}", prompt_id)))?;
        if !prompt.is_public && prompt.author_id != owner_id {
            return Err(AppError::NotFound(format!("Prompt not found: {}", prompt_id)));
        }

        let result = sqlx::query(
            "INSERT INTO collection_items (collection_id, prompt_id, added_at) VALUES (?1, ?2, ?3)",
        )
        .bind(collection_id)
        .bind(prompt_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result {
            if is_unique_violation(db_err.as_ref()) {
                return Err(AppError::AlreadyExists("Already in collection".to_string()));
            }
        }
        result?;

        Ok(())
    }

    /// Remove a prompt from a collection. Idempotent.
    pub async fn remove_item(
        &self,
        collection_id: &str,
        prompt_id: &str,
        owner_id: &str,
    ) -> AppResult<()> {
        self.owned(collection_id, owner_id).await?;
        sqlx::query(
            "DELETE FROM collection_items WHERE collection_id = ?1 AND prompt_id = ?2",
        )
        .bind(collection_id)
        .bind(prompt_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Prompts in a collection, most recently added first
    pub async fn items(
        &self,
        collection_id: &str,
        viewer: Option<&str>,
    ) -> AppResult<Vec<Prompt>> {
        self.get_visible(collection_id, viewer).await?;

        let prompts = sqlx::query_as::<_, Prompt>(
            "SELECT p.* FROM prompts p
             JOIN collection_items ci ON ci.prompt_id = p.id
             WHERE ci.collection_id = ?1
             ORDER BY ci.added_at DESC",
        )
        .bind(collection_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prompts)
    }

    async fn owned(&self, collection_id: &str, owner_id: &str) -> AppResult<Collection> {
        let collection =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = ?1")
                .bind(collection_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

        if collection.owner_id != owner_id {
            return Err(AppError::Authorization(
                "Only the owner may modify this collection".to_string(),
            ));
        }

        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_user, test_pool};
    use crate::prompts::{NewPrompt, PromptStore};

    async fn setup() -> (CollectionManager, SqlitePool, String, String) {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "owner").await;

        let store = PromptStore::new(pool.clone());
        let prompt = store
            .create(
                &owner,
                NewPrompt {
                    title: "Collected".to_string(),
                    body: "body".to_string(),
                    tags: vec![],
                    is_public: true,
                },
            )
            .await
            .unwrap();

        (CollectionManager::new(pool.clone()), pool, owner, prompt.id)
    }

    fn input(name: &str, public: bool) -> CollectionInput {
        CollectionInput {
            name: name.to_string(),
            description: String::new(),
            is_public: public,
        }
    }

    #[tokio::test]
    async fn add_and_remove_items() {
        let (mgr, _pool, owner, prompt_id) = setup().await;
        let collection = mgr.create(&owner, input("Favorites", false)).await.unwrap();

        mgr.add_item(&collection.id, &prompt_id, &owner).await.unwrap();
        let items = mgr.items(&collection.id, Some(&owner)).await.unwrap();
        assert_eq!(items.len(), 1);

        let err = mgr
            .add_item(&collection.id, &prompt_id, &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        mgr.remove_item(&collection.id, &prompt_id, &owner).await.unwrap();
        // Idempotent removal
        mgr.remove_item(&collection.id, &prompt_id, &owner).await.unwrap();
        assert!(mgr.items(&collection.id, Some(&owner)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_collection_hidden_from_others() {
        let (mgr, pool, owner, _prompt_id) = setup().await;
        let other = seed_user(&pool, "other").await;
        let collection = mgr.create(&owner, input("Stash", false)).await.unwrap();

        let err = mgr
            .get_visible(&collection.id, Some(&other))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Public collections are readable by anyone
        let public = mgr.create(&owner, input("Shared", true)).await.unwrap();
        assert!(mgr.get_visible(&public.id, None).await.is_ok());
    }

    #[tokio::test]
    async fn only_owner_mutates() {
        let (mgr, pool, owner, prompt_id) = setup().await;
        let other = seed_user(&pool, "other").await;
        let collection = mgr.create(&owner, input("Mine", true)).await.unwrap();

        let err = mgr
            .add_item(&collection.id, &prompt_id, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let err = mgr.delete(&collection.id, &other).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
