use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors that cross the service boundary. Storage failures are logged and folded
/// into `TransientStoreFailure` before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid target url: {0}")]
    InvalidTarget(String),
    #[error("no free token found after {attempts} attempts")]
    CapacityExhausted { attempts: u32 },
    #[error("short link '{0}' not found")]
    NotFound(String),
    #[error("link store is temporarily unavailable")]
    TransientStoreFailure,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl LinkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            LinkError::CapacityExhausted { .. } | LinkError::TransientStoreFailure => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LinkError::NotFound(_) => StatusCode::NOT_FOUND,
            LinkError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::CapacityExhausted { .. } | LinkError::TransientStoreFailure
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
