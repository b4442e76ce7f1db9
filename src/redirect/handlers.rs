use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;

use super::middleware::RequestStart;
use crate::config::RedirectMode;
use crate::error::LinkError;
use crate::service::ResolutionService;

pub struct RedirectState {
    pub service: Arc<ResolutionService>,
    pub redirect_mode: RedirectMode,
}

/// Record the visit and redirect to the target URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(token): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
) -> Result<Response, LinkError> {
    let target = state.service.resolve(&token).await?;

    let Ok(location) = HeaderValue::from_str(&target) else {
        // Targets are validated URLs, so this only trips on corrupted rows
        tracing::error!(token = %token, "stored target is not a valid Location header");
        return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        "x-linktrail-timing-ms",
        HeaderValue::from(request_start.elapsed().as_millis() as u64),
    );

    Ok((state.redirect_mode.status_code(), headers).into_response())
}
