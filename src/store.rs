//! Link persistence with token allocation and atomic visit recording.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::LinkError;
use crate::models::{LinkAnalytics, NewLink, ShortLink};
use crate::storage::{Storage, StorageError, StorageResult};
use crate::token::{self, RandomTokenGenerator, TokenGenerator};
use crate::validation::validate_target_url;

pub struct LinkStore {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn TokenGenerator>,
    max_attempts: u32,
    timeout: Duration,
}

impl LinkStore {
    pub fn new(
        storage: Arc<dyn Storage>,
        generator: Arc<dyn TokenGenerator>,
        max_attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            generator,
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::new(
            storage,
            Arc::new(RandomTokenGenerator::new(config.tokens.length)),
            config.tokens.max_attempts,
            config.storage_timeout(),
        )
    }

    /// Validate `target_url` and persist it under a freshly generated token.
    ///
    /// Token uniqueness is decided by the storage insert itself; a conflict draws a
    /// new token, up to `max_attempts` times.
    pub async fn create(
        &self,
        target_url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortLink, LinkError> {
        let target_url = validate_target_url(target_url).map_err(LinkError::InvalidTarget)?;

        for attempt in 1..=self.max_attempts {
            let candidate = NewLink {
                token: self.generator.generate(),
                target_url: target_url.clone(),
                owner_id: owner_id.map(str::to_string),
                created_at: now_millis(),
            };
            let token = candidate.token.clone();

            match self.storage.insert(candidate).await {
                Ok(link) => return Ok(link),
                Err(StorageError::Conflict) => {
                    debug!(token = %token, attempt, "token collision, regenerating");
                }
                Err(err) => return Err(store_failure("create", &token, err)),
            }
        }

        warn!(attempts = self.max_attempts, "token space exhausted");
        Err(LinkError::CapacityExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Find the link and append one visit, as a single storage operation.
    pub async fn record_visit_and_fetch(&self, token: &str) -> Result<ShortLink, LinkError> {
        if !token::is_well_formed(token) {
            return Err(LinkError::NotFound(token.to_string()));
        }

        // Stamped here, before the storage call, so the record reflects access time
        let visited_at = now_millis();

        match self.storage.record_visit(token, visited_at).await {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(LinkError::NotFound(token.to_string())),
            Err(err) => Err(store_failure("record_visit", token, err)),
        }
    }

    /// Current state of a link. Records nothing.
    pub async fn get(&self, token: &str) -> Result<ShortLink, LinkError> {
        if !token::is_well_formed(token) {
            return Err(LinkError::NotFound(token.to_string()));
        }

        match self.guarded(self.storage.get(token)).await {
            Ok(Some(link)) => Ok(link),
            Ok(None) => Err(LinkError::NotFound(token.to_string())),
            Err(err) => Err(store_failure("get", token, err)),
        }
    }

    pub async fn get_analytics(&self, token: &str) -> Result<LinkAnalytics, LinkError> {
        if !token::is_well_formed(token) {
            return Err(LinkError::NotFound(token.to_string()));
        }

        match self.guarded(self.storage.analytics(token)).await {
            Ok(Some(analytics)) => Ok(analytics),
            Ok(None) => Err(LinkError::NotFound(token.to_string())),
            Err(err) => Err(store_failure("analytics", token, err)),
        }
    }

    /// Return a link to the absent state. A visit racing the delete either commits
    /// first (and is removed with the link) or finds nothing.
    pub async fn delete(&self, token: &str) -> Result<(), LinkError> {
        if !token::is_well_formed(token) {
            return Err(LinkError::NotFound(token.to_string()));
        }

        match self.storage.delete(token).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(LinkError::NotFound(token.to_string())),
            Err(err) => Err(store_failure("delete", token, err)),
        }
    }

    pub async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ShortLink>, LinkError> {
        self.guarded(self.storage.list(owner_id, limit, offset))
            .await
            .map_err(|err| store_failure("list", owner_id.unwrap_or("*"), err))
    }

    /// Bound a read by the configured timeout.
    ///
    /// Writes never go through here: dropping an in-flight write cannot tell whether
    /// it committed. The backends bound writes with driver timeouts that roll back.
    async fn guarded<T>(&self, call: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Unavailable(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

fn store_failure(operation: &'static str, token: &str, err: StorageError) -> LinkError {
    match err {
        StorageError::Unavailable(reason) => {
            warn!(operation, token = %token, reason = %reason, "storage unavailable");
        }
        other => {
            error!(operation, token = %token, error = %other, "storage operation failed");
        }
    }
    LinkError::TransientStoreFailure
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
