//! Credential collaborator.
//!
//! The resolution service receives an [`Authenticator`] at construction and asks it
//! who a requester is; how credentials are checked is the authenticator's business.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMode};

/// Raw credentials presented with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Reads `X-API-Key`, falling back to `Authorization: Bearer <key>`.
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get("x-api-key")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let from_bearer = || {
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Ok(Credentials {
            api_key: from_header.or_else(from_bearer).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Authentication is disabled; links are created without an owner
    Anonymous,
    User(String),
}

impl Identity {
    pub fn owner_id(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("invalid credentials")]
    Rejected,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError>;
}

/// Accepts everyone as [`Identity::Anonymous`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait]
impl Authenticator for NoAuth {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<Identity, AuthError> {
        Ok(Identity::Anonymous)
    }
}

/// Static API keys, each mapped to a user id.
pub struct ApiKeyAuthenticator {
    keys: Vec<(String, String)>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let presented = credentials.api_key.as_deref().ok_or(AuthError::Missing)?;

        // Compare against every key so timing does not reveal which prefix matched
        let mut matched = None;
        for (key, user) in &self.keys {
            if bool::from(key.as_bytes().ct_eq(presented.as_bytes())) {
                matched = Some(user);
            }
        }

        matched
            .map(|user| Identity::User(user.clone()))
            .ok_or(AuthError::Rejected)
    }
}

pub fn authenticator_from_config(config: &AuthConfig) -> Arc<dyn Authenticator> {
    match config.mode {
        AuthMode::None => Arc::new(NoAuth),
        AuthMode::ApiKey => Arc::new(ApiKeyAuthenticator::new(config.api_keys.clone())),
    }
}
