use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use linktrail::auth::authenticator_from_config;
use linktrail::config::{AuthMode, Config};
use linktrail::service::ResolutionService;
use linktrail::storage;
use linktrail::store::LinkStore;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=linktrail=debug
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linktrail=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!(
        "Using {:?} storage: {}",
        config.database.backend, config.database.url
    );
    let storage = storage::connect(&config.database, config.storage_timeout()).await?;

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - links are created without an owner");
        }
        AuthMode::ApiKey => {
            info!(
                "🔐 API key authentication enabled ({} keys)",
                config.auth.api_keys.len()
            );
        }
    }

    let links = LinkStore::from_config(storage, &config);
    let service = Arc::new(ResolutionService::new(
        links,
        authenticator_from_config(&config.auth),
    ));

    let app = linktrail::create_app(service, config.redirect_status);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 linktrail listening on http://{}", addr);
    info!(
        "   - token length {}, up to {} attempts per link",
        config.tokens.length, config.tokens.max_attempts
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
