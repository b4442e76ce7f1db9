use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::config::RedirectMode;
use crate::service::ResolutionService;

use super::handlers::{redirect_url, RedirectState};
use super::middleware::record_request_start;

pub fn create_redirect_router(
    service: Arc<ResolutionService>,
    redirect_mode: RedirectMode,
) -> Router {
    let state = Arc::new(RedirectState {
        service,
        redirect_mode,
    });

    Router::new()
        .route("/{token}", get(redirect_url))
        .route("/url/{token}", get(redirect_url))
        .layer(middleware::from_fn(record_request_start))
        .with_state(state)
}
