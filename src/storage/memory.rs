use crate::models::{LinkAnalytics, NewLink, ShortLink, VisitRecord};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Entry {
    link: ShortLink,
    /// Insertion sequence, breaks `created_at` ties when listing
    seq: u64,
    visits: Vec<VisitRecord>,
}

/// In-process storage backed by a sharded `DashMap`.
///
/// Every mutation happens while holding the shard lock of its token, so a visit's
/// lookup and append cannot interleave with another writer on the same token.
/// State is lost on restart; intended for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    links: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, link: NewLink) -> StorageResult<ShortLink> {
        match self.links.entry(link.token.clone()) {
            MapEntry::Occupied(_) => Err(StorageError::Conflict),
            MapEntry::Vacant(slot) => {
                let link = link.into_link();
                slot.insert(Entry {
                    link: link.clone(),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    visits: Vec::new(),
                });
                Ok(link)
            }
        }
    }

    async fn get(&self, token: &str) -> StorageResult<Option<ShortLink>> {
        Ok(self.links.get(token).map(|entry| entry.link.clone()))
    }

    async fn record_visit(&self, token: &str, visited_at: i64) -> StorageResult<Option<ShortLink>> {
        let Some(mut entry) = self.links.get_mut(token) else {
            return Ok(None);
        };

        // Keep the log sorted by timestamp; a late-arriving earlier stamp lands
        // after any equal stamps, which matches the SQL backends' (visited_at, id) order.
        let record = VisitRecord {
            timestamp: visited_at,
        };
        let at = entry.visits.partition_point(|v| v.timestamp <= visited_at);
        entry.visits.insert(at, record);

        entry.link.visit_count += 1;
        entry.link.updated_at = entry.link.updated_at.max(visited_at);

        Ok(Some(entry.link.clone()))
    }

    async fn analytics(&self, token: &str) -> StorageResult<Option<LinkAnalytics>> {
        Ok(self.links.get(token).map(|entry| LinkAnalytics {
            token: entry.link.token.clone(),
            target_url: entry.link.target_url.clone(),
            created_at: entry.link.created_at,
            visit_log: entry.visits.clone(),
        }))
    }

    async fn delete(&self, token: &str) -> StorageResult<bool> {
        Ok(self.links.remove(token).is_some())
    }

    async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StorageResult<Vec<ShortLink>> {
        let mut matching: Vec<(i64, u64, ShortLink)> = self
            .links
            .iter()
            .filter(|entry| owner_id.is_none() || entry.link.owner_id.as_deref() == owner_id)
            .map(|entry| (entry.link.created_at, entry.seq, entry.link.clone()))
            .collect();

        matching.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, _, link)| link)
            .collect())
    }
}
