use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{Authenticator, Credentials, Identity};
use crate::error::LinkError;
use crate::models::{LinkAnalytics, ShortLink};
use crate::store::LinkStore;

/// Request-facing orchestration over the link store.
pub struct ResolutionService {
    links: LinkStore,
    authenticator: Arc<dyn Authenticator>,
}

impl ResolutionService {
    pub fn new(links: LinkStore, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            links,
            authenticator,
        }
    }

    async fn identify(&self, credentials: &Credentials) -> Result<Identity, LinkError> {
        self.authenticator
            .authenticate(credentials)
            .await
            .map_err(|err| {
                debug!(error = %err, "requester rejected");
                LinkError::Unauthorized(err.to_string())
            })
    }

    /// Create a link owned by the authenticated requester.
    pub async fn shorten(
        &self,
        target_url: &str,
        credentials: &Credentials,
    ) -> Result<ShortLink, LinkError> {
        let identity = self.identify(credentials).await?;
        self.shorten_as(target_url, &identity).await
    }

    /// Create a link for an already established identity (admin tooling).
    pub async fn shorten_as(
        &self,
        target_url: &str,
        identity: &Identity,
    ) -> Result<ShortLink, LinkError> {
        let link = self.links.create(target_url, identity.owner_id()).await?;
        info!(
            token = %link.token,
            owner = identity.owner_id().unwrap_or("-"),
            "short link created"
        );
        Ok(link)
    }

    /// Record a visit and return the redirect target.
    pub async fn resolve(&self, token: &str) -> Result<String, LinkError> {
        match self.links.record_visit_and_fetch(token).await {
            Ok(link) => Ok(link.target_url),
            Err(LinkError::NotFound(token)) => {
                debug!(token = %token, "resolve miss");
                Err(LinkError::NotFound(token))
            }
            Err(err) => Err(err),
        }
    }

    /// Inspect a link without counting a visit (admin tooling).
    pub async fn lookup(&self, token: &str) -> Result<ShortLink, LinkError> {
        self.links.get(token).await
    }

    pub async fn analytics(&self, token: &str) -> Result<LinkAnalytics, LinkError> {
        self.links.get_analytics(token).await
    }

    /// Links visible to the requester: their own, or all of them when
    /// authentication is disabled.
    pub async fn links_for(
        &self,
        credentials: &Credentials,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ShortLink>, LinkError> {
        let identity = self.identify(credentials).await?;
        self.links.list(identity.owner_id(), limit, offset).await
    }

    pub async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ShortLink>, LinkError> {
        self.links.list(owner_id, limit, offset).await
    }

    /// Administrative removal. Not reachable over HTTP.
    pub async fn remove(&self, token: &str) -> Result<(), LinkError> {
        self.links.delete(token).await?;
        warn!(token = %token, "short link deleted");
        Ok(())
    }
}
