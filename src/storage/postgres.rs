use crate::models::{LinkAnalytics, NewLink, ShortLink};
use crate::storage::sqlite::{collect_analytics, AnalyticsRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::with_timeout(database_url, max_connections, Duration::from_secs(5)).await
    }

    /// `timeout` becomes the session `statement_timeout` and the pool checkout limit.
    /// The server cancels and rolls back a statement that exceeds it, so a timed-out
    /// write never commits.
    pub async fn with_timeout(
        database_url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)?
            .options([("statement_timeout", format!("{}ms", timeout.as_millis()))]);

        let pool = PgPoolOptions::new()
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
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                token TEXT NOT NULL UNIQUE,
                target_url TEXT NOT NULL,
                owner_id TEXT,
                visit_count BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
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
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                visited_at BIGINT NOT NULL
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
        let row = sqlx::query_as::<_, ShortLink>(
            r#"
            INSERT INTO links (token, target_url, owner_id, visit_count, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $4)
            ON CONFLICT (token) DO NOTHING
            RETURNING token, target_url, owner_id, visit_count, created_at, updated_at
            "#,
        )
        .bind(&link.token)
        .bind(&link.target_url)
        .bind(&link.owner_id)
        .bind(link.created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.ok_or(StorageError::Conflict)
    }

    async fn get(&self, token: &str) -> StorageResult<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT token, target_url, owner_id, visit_count, created_at, updated_at
            FROM links
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn record_visit(&self, token: &str, visited_at: i64) -> StorageResult<Option<ShortLink>> {
        // The UPDATE row lock serializes visits (and deletes) on this token until commit.
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query_as::<_, (i64, String, String, Option<String>, i64, i64, i64)>(
            r#"
            UPDATE links
            SET visit_count = visit_count + 1,
                updated_at = GREATEST(updated_at, $2)
            WHERE token = $1
            RETURNING id, token, target_url, owner_id, visit_count, created_at, updated_at
            "#,
        )
        .bind(token)
        .bind(visited_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((link_id, token, target_url, owner_id, visit_count, created_at, updated_at)) =
            touched
        else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO visits (link_id, visited_at) VALUES ($1, $2)")
            .bind(link_id)
            .bind(visited_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(ShortLink {
            token,
            target_url,
            owner_id,
            visit_count,
            created_at,
            updated_at,
        }))
    }

    async fn analytics(&self, token: &str) -> StorageResult<Option<LinkAnalytics>> {
        let rows = sqlx::query_as::<_, AnalyticsRow>(
            r#"
            SELECT l.token, l.target_url, l.created_at, v.visited_at
            FROM links l
            LEFT JOIN visits v ON v.link_id = l.id
            WHERE l.token = $1
            ORDER BY v.visited_at ASC, v.id ASC
            "#,
        )
        .bind(token)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(collect_analytics(rows))
    }

    async fn delete(&self, token: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM links WHERE token = $1")
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
        let links = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT token, target_url, owner_id, visit_count, created_at, updated_at
            FROM links
            WHERE $1::TEXT IS NULL OR owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }
}
