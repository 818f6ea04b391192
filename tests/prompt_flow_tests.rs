/// End-to-end flows over a real (temporary) database: accounts, prompts,
/// engagement, version history, and the remix tree, exercised through the
/// same managers the HTTP handlers call.
use prompt_party::{
    account::AccountManager,
    config::ServerConfig,
    db,
    engagement::EngagementManager,
    error::AppError,
    prompts::{ForkManager, NewPrompt, PromptQuery, PromptStore, PromptUpdate, VersionManager,
        DEFAULT_REMIX_DEPTH_CAP},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

struct TestApp {
    // Held so the database file outlives the pool
    _dir: TempDir,
    pool: SqlitePool,
    accounts: AccountManager,
}

async fn test_app() -> TestApp {
    std::env::set_var("PP_JWT_SECRET", "integration-test-secret-0123456789abcdef");
    let config = Arc::new(ServerConfig::from_env().expect("config"));

    let dir = tempfile::tempdir().expect("tempdir");
    let pool = db::create_pool(&dir.path().join("test.sqlite"), db::DatabaseOptions::default())
        .await
        .expect("pool");
    db::run_migrations(&pool).await.expect("migrations");

    let accounts = AccountManager::new(pool.clone(), config);
    TestApp {
        _dir: dir,
        pool,
        accounts,
    }
}

async fn register(app: &TestApp, handle: &str) -> String {
    let (user, _) = app
        .accounts
        .register(handle.to_string(), None, "password123".to_string(), None)
        .await
        .expect("register");
    user.id
}

#[tokio::test]
async fn like_flow_persists_and_rejects_duplicates() {
    let app = test_app().await;
    let author = register(&app, "author").await;
    let fan = register(&app, "fan").await;

    let store = PromptStore::new(app.pool.clone());
    let engagement = EngagementManager::new(app.pool.clone());

    let prompt = store
        .create(
            &author,
            NewPrompt {
                title: "Explain like I'm five".to_string(),
                body: "Explain {topic} to a five year old.".to_string(),
                tags: vec!["teaching".to_string()],
                is_public: true,
            },
        )
        .await
        .unwrap();

    engagement.like(&fan, &prompt.id).await.unwrap();
    assert!(engagement.has_liked(&fan, &prompt.id).await.unwrap());
    assert_eq!(store.get(&prompt.id).await.unwrap().like_count, 1);

    // Liking twice is rejected instead of double counting
    let err = engagement.like(&fan, &prompt.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists(_)));
    assert_eq!(store.get(&prompt.id).await.unwrap().like_count, 1);

    // Unlike is idempotent
    engagement.unlike(&fan, &prompt.id).await.unwrap();
    engagement.unlike(&fan, &prompt.id).await.unwrap();
    assert_eq!(store.get(&prompt.id).await.unwrap().like_count, 0);
}

#[tokio::test]
async fn version_history_grows_through_edits_and_restores() {
    let app = test_app().await;
    let author = register(&app, "editor").await;

    let store = PromptStore::new(app.pool.clone());
    let versions = VersionManager::new(app.pool.clone());

    let prompt = store
        .create(
            &author,
            NewPrompt {
                title: "Draft".to_string(),
                body: "v1 body".to_string(),
                tags: vec![],
                is_public: true,
            },
        )
        .await
        .unwrap();

    // Edit with save_version snapshots the pre-edit content
    store
        .update(
            &prompt.id,
            &author,
            PromptUpdate {
                body: Some("v2 body".to_string()),
                save_version: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let history = versions.list(&prompt.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "v1 body");

    // Restore snapshots the current content before applying the old one
    let restored = versions.restore(&prompt.id, history[0].version_number, &author)
        .await
        .unwrap();
    assert_eq!(restored.body, "v1 body");
    assert_eq!(versions.list(&prompt.id).await.unwrap().len(), 2);

    // Only the author may restore
    let outsider = register(&app, "outsider").await;
    let err = versions
        .restore(&prompt.id, history[0].version_number, &outsider)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[tokio::test]
async fn remix_tree_spans_generations() {
    let app = test_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    let store = PromptStore::new(app.pool.clone());
    let forks = ForkManager::new(app.pool.clone());

    let root = store
        .create(
            &alice,
            NewPrompt {
                title: "Root".to_string(),
                body: "original".to_string(),
                tags: vec![],
                is_public: true,
            },
        )
        .await
        .unwrap();

    let child = forks.fork(&root.id, &bob).await.unwrap();
    let grandchild = forks.fork(&child.id, &carol).await.unwrap();

    let tree = forks
        .remix_tree(&root.id, None, DEFAULT_REMIX_DEPTH_CAP)
        .await
        .unwrap();
    assert_eq!(tree.prompt_id, root.id);
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].prompt_id, child.id);
    assert_eq!(tree.children[0].children[0].prompt_id, grandchild.id);
    assert!(!tree.truncated);

    // The fork edge points at the original
    let edge = forks.parent_edge(&child.id, None).await.unwrap().unwrap();
    assert_eq!(edge.original_prompt_id, root.id);
}

#[tokio::test]
async fn feed_paginates_with_cursor() {
    let app = test_app().await;
    let author = register(&app, "prolific").await;
    let store = PromptStore::new(app.pool.clone());

    for i in 0..7 {
        store
            .create(
                &author,
                NewPrompt {
                    title: format!("Prompt {}", i),
                    body: "body".to_string(),
                    tags: vec![],
                    is_public: true,
                },
            )
            .await
            .unwrap();
        // Distinct created_at values keep the cursor unambiguous
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let first = store
        .list(&PromptQuery {
            limit: 3,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.prompts.len(), 3);
    let cursor = first.cursor.expect("more pages");

    let second = store
        .list(&PromptQuery {
            limit: 3,
            cursor: Some(cursor),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.prompts.len(), 3);

    // No overlap between pages
    for p in &second.prompts {
        assert!(first.prompts.iter().all(|q| q.id != p.id));
    }

    let third = store
        .list(&PromptQuery {
            limit: 3,
            cursor: second.cursor.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(third.prompts.len(), 1);
    assert!(third.cursor.is_none());
}

#[tokio::test]
async fn private_prompts_stay_hidden() {
    let app = test_app().await;
    let author = register(&app, "secretive").await;
    let other = register(&app, "curious").await;
    let store = PromptStore::new(app.pool.clone());

    let prompt = store
        .create(
            &author,
            NewPrompt {
                title: "Hidden".to_string(),
                body: "secret sauce".to_string(),
                tags: vec![],
                is_public: false,
            },
        )
        .await
        .unwrap();

    assert!(store.get_visible(&prompt.id, Some(&author)).await.is_ok());

    let err = store.get_visible(&prompt.id, Some(&other)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = store.get_visible(&prompt.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Private prompts never show up in the feed
    let feed = store.list(&PromptQuery::default()).await.unwrap();
    assert!(feed.prompts.iter().all(|p| p.id != prompt.id));

    // Nor through the remix tree, the fork edge, or the comment list
    let forks = ForkManager::new(app.pool.clone());
    let engagement = EngagementManager::new(app.pool.clone());
    let err = forks
        .remix_tree(&prompt.id, Some(&other), DEFAULT_REMIX_DEPTH_CAP)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = forks.parent_edge(&prompt.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = engagement.list_comments(&prompt.id, Some(&other)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
