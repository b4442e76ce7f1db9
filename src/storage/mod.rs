pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::config::{DatabaseBackend, DatabaseConfig};
use std::sync::Arc;
use std::time::Duration;

/// Open the configured backend. Tables are not created; call [`Storage::init`].
///
/// `timeout` is enforced by the driver itself, so a write that times out has not
/// committed.
pub async fn connect(
    config: &DatabaseConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::with_timeout(&config.url, config.max_connections, timeout).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::with_timeout(&config.url, config.max_connections, timeout).await?,
        ),
        DatabaseBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(storage)
}
