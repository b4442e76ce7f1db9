use axum::{routing::get, Router};
use std::sync::Arc;

use crate::service::ResolutionService;

use super::handlers::{create_url, get_analytics, health_check, list_urls, AppState};

pub fn create_api_router(service: Arc<ResolutionService>) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/health", get(health_check))
        .route("/url", get(list_urls).post(create_url))
        .route("/url/analytics/{token}", get(get_analytics))
        .with_state(state)
}
