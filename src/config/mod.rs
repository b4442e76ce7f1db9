use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::token::{MAX_TOKEN_LENGTH, MIN_TOKEN_LENGTH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub tokens: TokenConfig,
    /// Upper bound on any single storage call
    pub storage_timeout_ms: u64,
    pub redirect_status: RedirectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

impl DatabaseBackend {
    /// Parse a `DATABASE_BACKEND` value. Unknown names fall back to sqlite with a warning.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sqlite" => DatabaseBackend::Sqlite,
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, memory"
                );
                DatabaseBackend::Sqlite
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// API key -> user id
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenConfig {
    pub length: usize,
    pub max_attempts: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            length: 8,
            max_attempts: 5,
        }
    }
}

/// Status code used for redirects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    #[serde(rename = "301")]
    MovedPermanently,
    #[default]
    #[serde(rename = "302")]
    Found,
    #[serde(rename = "307")]
    Temporary,
    #[serde(rename = "308")]
    Permanent,
}

impl RedirectMode {
    pub fn status_code(self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            RedirectMode::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
            RedirectMode::Found => StatusCode::FOUND,
            RedirectMode::Temporary => StatusCode::TEMPORARY_REDIRECT,
            RedirectMode::Permanent => StatusCode::PERMANENT_REDIRECT,
        }
    }
}

impl FromStr for RedirectMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "301" => Ok(RedirectMode::MovedPermanently),
            "302" => Ok(RedirectMode::Found),
            "307" => Ok(RedirectMode::Temporary),
            "308" => Ok(RedirectMode::Permanent),
            other => bail!("unsupported REDIRECT_STATUS '{other}', expected 301, 302, 307 or 308"),
        }
    }
}

impl Config {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = DatabaseBackend::parse_or_default(&backend_str);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./linktrail.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8001".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let token_length = std::env::var("TOKEN_LENGTH")
            .unwrap_or_else(|_| TokenConfig::default().length.to_string())
            .parse::<usize>()
            .context("TOKEN_LENGTH must be an integer")?;
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token_length) {
            bail!("TOKEN_LENGTH must be between {MIN_TOKEN_LENGTH} and {MAX_TOKEN_LENGTH}");
        }

        let max_attempts = std::env::var("TOKEN_MAX_ATTEMPTS")
            .unwrap_or_else(|_| TokenConfig::default().max_attempts.to_string())
            .parse::<u32>()
            .context("TOKEN_MAX_ATTEMPTS must be an integer")?;
        if max_attempts == 0 {
            bail!("TOKEN_MAX_ATTEMPTS must be at least 1");
        }

        let storage_timeout_ms = std::env::var("STORAGE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .context("STORAGE_TIMEOUT_MS must be an integer")?;

        let redirect_status = match std::env::var("REDIRECT_STATUS") {
            Ok(value) => value.parse::<RedirectMode>()?,
            Err(_) => RedirectMode::default(),
        };

        let auth_mode = match std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => AuthMode::None,
            "apikey" | "api_key" => AuthMode::ApiKey,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, apikey"
                );
                AuthMode::None
            }
        };

        let api_keys = if auth_mode == AuthMode::ApiKey {
            let raw = std::env::var("API_KEYS")
                .context("API_KEYS must be set when AUTH_MODE=apikey")?;
            let keys = parse_api_keys(&raw)?;
            if keys.is_empty() {
                bail!("API_KEYS must contain at least one key=user pair");
            }
            keys
        } else {
            HashMap::new()
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            auth: AuthConfig {
                mode: auth_mode,
                api_keys,
            },
            tokens: TokenConfig {
                length: token_length,
                max_attempts,
            },
            storage_timeout_ms,
            redirect_status,
        })
    }
}

/// Parse `key=user,key2=user2` into a key -> user id map.
pub fn parse_api_keys(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> anyhow::Result<(String, String)> {
            let (key, user) = pair
                .split_once('=')
                .with_context(|| format!("API_KEYS entry '{pair}' is not key=user"))?;
            let (key, user) = (key.trim(), user.trim());
            if key.is_empty() || user.is_empty() {
                bail!("API_KEYS entry '{pair}' has an empty key or user");
            }
            Ok((key.to_string(), user.to_string()))
        })
        .collect()
}
