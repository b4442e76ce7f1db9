pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod redirect;
pub mod service;
pub mod storage;
pub mod store;
pub mod token;
pub mod validation;

use axum::Router;
use std::sync::Arc;

use config::RedirectMode;
use service::ResolutionService;

/// The public HTTP surface: link API merged with the redirect routes.
pub fn create_app(service: Arc<ResolutionService>, redirect_mode: RedirectMode) -> Router {
    api::create_api_router(Arc::clone(&service))
        .merge(redirect::create_redirect_router(service, redirect_mode))
}
