//! Integration tests for the SQL storage backends
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, SQLite always runs and PostgreSQL runs when DATABASE_URL is set

use linktrail::models::NewLink;
use linktrail::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use sqlx::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true,
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// File-backed SQLite database in WAL mode, removed on drop
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let name = format!("linktrail-test-{}.db", rand::random::<u64>());
        Self {
            path: std::env::temp_dir().join(name),
        }
    }

    fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn new_link(token: &str, url: &str, owner: Option<&str>, created_at: i64) -> NewLink {
    NewLink {
        token: token.to_string(),
        target_url: url.to_string(),
        owner_id: owner.map(str::to_string),
        created_at,
    }
}

/// Unique per test run so Postgres tests can share a database
fn unique(prefix: &str) -> String {
    format!("{}{:06}", prefix, rand::random_range(0..1_000_000u32))
}

async fn check_insert_and_conflict(storage: Arc<dyn Storage>) {
    let token = unique("ins");
    let link = storage
        .insert(new_link(&token, "https://example.com/a", Some("alice"), 1_000))
        .await
        .unwrap();
    assert_eq!(link.token, token);
    assert_eq!(link.visit_count, 0);
    assert_eq!(link.created_at, 1_000);
    assert_eq!(link.updated_at, 1_000);

    let err = storage
        .insert(new_link(&token, "https://example.com/b", None, 2_000))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // The original mapping is untouched
    let stored = storage.get(&token).await.unwrap().unwrap();
    assert_eq!(stored.target_url, "https://example.com/a");
    assert_eq!(stored.owner_id.as_deref(), Some("alice"));
}

async fn check_record_visit(storage: Arc<dyn Storage>) {
    let token = unique("vis");
    storage
        .insert(new_link(&token, "https://example.com/page", None, 1_000))
        .await
        .unwrap();

    for stamp in [2_000, 3_000, 3_000] {
        let link = storage.record_visit(&token, stamp).await.unwrap().unwrap();
        assert_eq!(link.target_url, "https://example.com/page");
    }

    let link = storage.get(&token).await.unwrap().unwrap();
    assert_eq!(link.visit_count, 3);
    assert_eq!(link.updated_at, 3_000);

    let analytics = storage.analytics(&token).await.unwrap().unwrap();
    let stamps: Vec<i64> = analytics.visit_log.iter().map(|v| v.timestamp).collect();
    assert_eq!(stamps, vec![2_000, 3_000, 3_000]);
    assert_eq!(analytics.target_url, "https://example.com/page");
}

async fn check_missing_token(storage: Arc<dyn Storage>) {
    let token = unique("nope");
    assert!(storage.record_visit(&token, 1).await.unwrap().is_none());
    assert!(storage.analytics(&token).await.unwrap().is_none());
    assert!(storage.get(&token).await.unwrap().is_none());
    assert!(!storage.delete(&token).await.unwrap());
}

async fn check_analytics_without_visits(storage: Arc<dyn Storage>) {
    let token = unique("emp");
    storage
        .insert(new_link(&token, "https://example.com", None, 5))
        .await
        .unwrap();

    let analytics = storage.analytics(&token).await.unwrap().unwrap();
    assert!(analytics.visit_log.is_empty());
    assert_eq!(analytics.created_at, 5);
}

async fn check_delete(storage: Arc<dyn Storage>) {
    let token = unique("del");
    storage
        .insert(new_link(&token, "https://example.com", None, 5))
        .await
        .unwrap();
    storage.record_visit(&token, 6).await.unwrap().unwrap();

    assert!(storage.delete(&token).await.unwrap());
    assert!(storage.analytics(&token).await.unwrap().is_none());
    assert!(storage.record_visit(&token, 7).await.unwrap().is_none());

    // The token is free again and starts with an empty log
    storage
        .insert(new_link(&token, "https://example.org", None, 8))
        .await
        .unwrap();
    let analytics = storage.analytics(&token).await.unwrap().unwrap();
    assert!(analytics.visit_log.is_empty());
}

async fn check_list_by_owner(storage: Arc<dyn Storage>) {
    let owner = unique("owner");
    let older = unique("old");
    let newer = unique("new");
    storage
        .insert(new_link(&older, "https://example.com/1", Some(&owner), 10))
        .await
        .unwrap();
    storage
        .insert(new_link(&newer, "https://example.com/2", Some(&owner), 20))
        .await
        .unwrap();
    storage
        .insert(new_link(&unique("oth"), "https://example.com/3", Some("someone-else"), 30))
        .await
        .unwrap();

    let links = storage.list(Some(&owner), 10, 0).await.unwrap();
    let tokens: Vec<&str> = links.iter().map(|l| l.token.as_str()).collect();
    assert_eq!(tokens, vec![newer.as_str(), older.as_str()]);

    let page = storage.list(Some(&owner), 1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].token, older);

    let everyone = storage.list(None, 100, 0).await.unwrap();
    assert!(everyone.len() >= 3);
}

async fn check_concurrent_visits(storage: Arc<dyn Storage>, visits: usize) {
    let token = unique("hot");
    storage
        .insert(new_link(&token, "https://example.com", None, 1))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..visits {
        let storage = Arc::clone(&storage);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            storage.record_visit(&token, 100 + i as i64).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.unwrap().is_some(), "every visit should find the link");
    }

    let analytics = storage.analytics(&token).await.unwrap().unwrap();
    assert_eq!(analytics.visit_log.len(), visits, "no visit may be lost");
    let link = storage.get(&token).await.unwrap().unwrap();
    assert_eq!(link.visit_count, visits as i64);

    let stamps: Vec<i64> = analytics.visit_log.iter().map(|v| v.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "log must be ordered");
}

async fn check_concurrent_insert_same_token(storage: Arc<dyn Storage>) {
    let token = unique("race");
    let mut handles = vec![];

    for i in 0..10 {
        let storage = Arc::clone(&storage);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            storage
                .insert(new_link(&token, "https://example.com", Some(&format!("user{i}")), 1))
                .await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9, "All others should conflict");
}

#[tokio::test]
async fn test_insert_and_conflict_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_insert_and_conflict(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_record_visit_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_record_visit(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_missing_token_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_missing_token(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_analytics_without_visits_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_analytics_without_visits(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_delete_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_delete(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_list_by_owner_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_list_by_owner(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_init_is_idempotent_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    storage.init().await.unwrap();
    check_missing_token(storage).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visits_sqlite_file() {
    if !should_test_backend("sqlite") {
        return;
    }
    let db = TempDb::new();
    let storage = SqliteStorage::new(&db.url(), 5).await.unwrap();
    storage.init().await.unwrap();

    check_concurrent_visits(Arc::new(storage), 100).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_insert_same_token_sqlite_file() {
    if !should_test_backend("sqlite") {
        return;
    }
    let db = TempDb::new();
    let storage = SqliteStorage::new(&db.url(), 5).await.unwrap();
    storage.init().await.unwrap();

    check_concurrent_insert_same_token(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_write_timeout_leaves_nothing_behind_sqlite_file() {
    if !should_test_backend("sqlite") {
        return;
    }
    let db = TempDb::new();
    let storage = SqliteStorage::with_timeout(&db.url(), 2, Duration::from_millis(100))
        .await
        .unwrap();
    storage.init().await.unwrap();
    storage
        .insert(new_link("locked", "https://example.com", None, 1))
        .await
        .unwrap();

    // Another writer holds the database lock past the timeout
    let mut blocker = sqlx::SqliteConnection::connect(&db.url()).await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut blocker)
        .await
        .unwrap();

    let err = storage
        .insert(new_link("fresh1", "https://example.org", None, 2))
        .await
        .unwrap_err();
    assert!(!matches!(err, StorageError::Conflict));
    assert!(storage.record_visit("locked", 3).await.is_err());

    sqlx::query("ROLLBACK").execute(&mut blocker).await.unwrap();
    blocker.close().await.unwrap();

    assert!(storage.get("fresh1").await.unwrap().is_none());
    let link = storage.get("locked").await.unwrap().unwrap();
    assert_eq!(link.visit_count, 0);
    assert!(storage
        .analytics("locked")
        .await
        .unwrap()
        .unwrap()
        .visit_log
        .is_empty());
}

#[tokio::test]
async fn test_storage_survives_reopen_sqlite_file() {
    if !should_test_backend("sqlite") {
        return;
    }
    let db = TempDb::new();
    {
        let storage = SqliteStorage::new(&db.url(), 2).await.unwrap();
        storage.init().await.unwrap();
        storage
            .insert(new_link("durab1", "https://example.com", None, 1))
            .await
            .unwrap();
        storage.record_visit("durab1", 2).await.unwrap().unwrap();
    }

    let storage = SqliteStorage::new(&db.url(), 2).await.unwrap();
    storage.init().await.unwrap();
    let analytics = storage.analytics("durab1").await.unwrap().unwrap();
    assert_eq!(analytics.visit_log.len(), 1);
}

#[tokio::test]
async fn test_all_operations_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };

    check_insert_and_conflict(Arc::clone(&storage)).await;
    check_record_visit(Arc::clone(&storage)).await;
    check_missing_token(Arc::clone(&storage)).await;
    check_analytics_without_visits(Arc::clone(&storage)).await;
    check_delete(Arc::clone(&storage)).await;
    check_list_by_owner(Arc::clone(&storage)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };

    check_concurrent_visits(Arc::clone(&storage), 100).await;
    check_concurrent_insert_same_token(storage).await;
}
