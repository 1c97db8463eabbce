//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sqlrelay_core::RelayError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Transaction/session/pool failure from the core
    Relay(RelayError),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Malformed or invalid request payload (400)
    Validation { message: String },

    /// Internal error (500, logged)
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Relay(err) => relay_response(err),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Validation { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": message
                }),
            ),
            Self::Internal { message } => {
                // Log the actual error, return generic message
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn relay_response(err: &RelayError) -> (StatusCode, serde_json::Value) {
    let (status, code) = match err {
        RelayError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        RelayError::AlreadyReleased { .. } => (StatusCode::CONFLICT, "already_released"),
        RelayError::CapacityExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "capacity_exceeded"),
        RelayError::AcquireFailed { .. } => (StatusCode::SERVICE_UNAVAILABLE, "acquire_failed"),
        RelayError::QueryFailed { .. } => (StatusCode::BAD_REQUEST, "query_error"),
        RelayError::UnknownSession { .. } => (StatusCode::NOT_FOUND, "unknown_session"),
        RelayError::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    (
        status,
        json!({
            "error": code,
            "message": err.to_string()
        }),
    )
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self::Relay(err)
    }
}
