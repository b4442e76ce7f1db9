use crate::models::{LinkAnalytics, NewLink, ShortLink, VisitRecord};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Row shape of the analytics join: link columns plus one (nullable) visit.
pub(crate) type AnalyticsRow = (String, String, i64, Option<i64>);

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::with_timeout(database_url, max_connections, DEFAULT_TIMEOUT).await
    }

    /// `timeout` bounds lock waits and pool checkout. A write that hits it fails
    /// before commit, so nothing is persisted.
    pub async fn with_timeout(
        database_url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(timeout);

        // WAL is not available for in-memory databases
        let options = if database_url.contains(":memory:") {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL UNIQUE,
                target_url TEXT NOT NULL,
                owner_id TEXT,
                visit_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner_id, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                visited_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_link ON visits(link_id, visited_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert(&self, link: NewLink) -> StorageResult<ShortLink> {
        let result = sqlx::query(
            r#"
            INSERT INTO links (token, target_url, owner_id, visit_count, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            ON CONFLICT(token) DO NOTHING
            "#,
        )
        .bind(&link.token)
        .bind(&link.target_url)
        .bind(&link.owner_id)
        .bind(link.created_at)
        .bind(link.created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(link.into_link())
    }

    async fn get(&self, token: &str) -> StorageResult<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT token, target_url, owner_id, visit_count, created_at, updated_at
            FROM links
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn record_visit(&self, token: &str, visited_at: i64) -> StorageResult<Option<ShortLink>> {
        // The UPDATE takes the write lock first, so no other writer can slip in
        // between the lookup and the append.
        let mut tx = self.pool.begin().await?;

        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            UPDATE links
            SET visit_count = visit_count + 1,
                updated_at = MAX(updated_at, ?)
            WHERE token = ?
            RETURNING token, target_url, owner_id, visit_count, created_at, updated_at
            "#,
        )
        .bind(visited_at)
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link) = link else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO visits (link_id, visited_at)
            SELECT id, ? FROM links WHERE token = ?
            "#,
        )
        .bind(visited_at)
        .bind(token)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(link))
    }

    async fn analytics(&self, token: &str) -> StorageResult<Option<LinkAnalytics>> {
        let rows = sqlx::query_as::<_, AnalyticsRow>(
            r#"
            SELECT l.token, l.target_url, l.created_at, v.visited_at
            FROM links l
            LEFT JOIN visits v ON v.link_id = l.id
            WHERE l.token = ?
            ORDER BY v.visited_at ASC, v.id ASC
            "#,
        )
        .bind(token)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(collect_analytics(rows))
    }

    async fn delete(&self, token: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM links WHERE token = ?")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StorageResult<Vec<ShortLink>> {
        let links = if let Some(owner) = owner_id {
            sqlx::query_as::<_, ShortLink>(
                r#"
                SELECT token, target_url, owner_id, visit_count, created_at, updated_at
                FROM links
                WHERE owner_id = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, ShortLink>(
                r#"
                SELECT token, target_url, owner_id, visit_count, created_at, updated_at
                FROM links
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(links)
    }
}

/// Fold the rows of a links/visits left join into one analytics value.
pub(crate) fn collect_analytics(rows: Vec<AnalyticsRow>) -> Option<LinkAnalytics> {
    let mut rows = rows.into_iter().peekable();
    let (token, target_url, created_at, _) = rows.peek()?.clone();

    let visit_log = rows
        .filter_map(|(_, _, _, visited_at)| visited_at)
        .map(|timestamp| VisitRecord { timestamp })
        .collect();

    Some(LinkAnalytics {
        token,
        target_url,
        created_at,
        visit_log,
    })
}
