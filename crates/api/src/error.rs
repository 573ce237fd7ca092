//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::Rejection;
use engine::SubmitError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Maps a per-order submission failure to its HTTP status code.
pub fn submit_error_status(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::CapacityExceeded | SubmitError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        SubmitError::Rejected(Rejection::OutOfStock { .. }) => StatusCode::CONFLICT,
        SubmitError::Rejected(Rejection::ProductNotFound { .. }) => StatusCode::NOT_FOUND,
        SubmitError::Rejected(Rejection::Persistence { .. }) | SubmitError::ResultChannelClosed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
