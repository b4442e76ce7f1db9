use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted short link. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub token: String,
    pub target_url: String,
    pub owner_id: Option<String>,
    pub visit_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A link about to be inserted. The token is only reserved once the insert succeeds.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub token: String,
    pub target_url: String,
    pub owner_id: Option<String>,
    pub created_at: i64,
}

impl NewLink {
    pub fn into_link(self) -> ShortLink {
        ShortLink {
            token: self.token,
            target_url: self.target_url,
            owner_id: self.owner_id,
            visit_count: 0,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisitRecord {
    pub timestamp: i64,
}

/// Full visit history of a link, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAnalytics {
    pub token: String,
    pub target_url: String,
    pub created_at: i64,
    pub visit_log: Vec<VisitRecord>,
}

impl LinkAnalytics {
    pub fn total_visits(&self) -> usize {
        self.visit_log.len()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    /// Missing is treated as empty so it fails URL validation like any bad input
    #[serde(alias = "url", default)]
    pub target_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "ListQuery::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl ListQuery {
    pub const MAX_LIMIT: i64 = 200;

    const fn default_limit() -> i64 {
        50
    }

    /// Limit and offset clamped to the accepted range.
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}
