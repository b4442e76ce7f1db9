use crate::models::{LinkAnalytics, NewLink, ShortLink};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token already exists")]
    Conflict,
    /// Connection loss, pool exhaustion or timeout. Nothing was written.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => StorageError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Other(other.into()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a new link. Returns `Conflict` if the token is taken; the check is the
    /// storage's own unique key.
    async fn insert(&self, link: NewLink) -> StorageResult<ShortLink>;

    /// Get a link without touching its visit log
    async fn get(&self, token: &str) -> StorageResult<Option<ShortLink>>;

    /// Atomically find the link and append a visit stamped `visited_at`.
    ///
    /// Returns the updated link, or `None` when no link matches, in which case nothing
    /// is written. Concurrent calls for one token are all recorded.
    async fn record_visit(&self, token: &str, visited_at: i64) -> StorageResult<Option<ShortLink>>;

    /// Link plus its full visit log ordered by timestamp, read from one snapshot
    async fn analytics(&self, token: &str) -> StorageResult<Option<LinkAnalytics>>;

    /// Remove a link and its visits
    async fn delete(&self, token: &str) -> StorageResult<bool>;

    /// List links newest first. `None` lists every owner's links.
    async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StorageResult<Vec<ShortLink>>;
}
