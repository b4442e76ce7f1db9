use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::Credentials;
use crate::error::LinkError;
use crate::models::{CreateLinkRequest, ListQuery, ShortLink, VisitRecord};
use crate::service::ResolutionService;

pub struct AppState {
    pub service: Arc<ResolutionService>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub token: String,
    pub target_url: String,
    pub created_at: i64,
    pub total_clicks: usize,
    pub visit_log: Vec<VisitRecord>,
}

/// Create a new short link
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    credentials: Credentials,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortLink>), LinkError> {
    // Unreadable bodies get the same 400 envelope as a bad URL
    let Json(payload) =
        payload.map_err(|rejection| LinkError::InvalidTarget(rejection.body_text()))?;

    let link = state
        .service
        .shorten(&payload.target_url, &credentials)
        .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// List the requester's links, newest first
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    credentials: Credentials,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ShortLink>>, LinkError> {
    let (limit, offset) = query.bounds();
    let links = state.service.links_for(&credentials, limit, offset).await?;
    Ok(Json(links))
}

/// Visit history for a link
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<AnalyticsResponse>, LinkError> {
    let analytics = state.service.analytics(&token).await?;

    Ok(Json(AnalyticsResponse {
        total_clicks: analytics.total_visits(),
        token: analytics.token,
        target_url: analytics.target_url,
        created_at: analytics.created_at,
        visit_log: analytics.visit_log,
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
