//! Journal error types with HTTP status code mapping.
//!
//! [`JournalError`] is the central error type for the journal. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Transient failures of the backing event log surface here only on
//! request/response paths; inside the asynchronous population callbacks
//! they are logged and swallowed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::EventId;
use crate::log::LogError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid date: 2024-13-40",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Journal error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status               |
/// |-----------|-----------------|---------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request           |
/// | 2000–2999 | Not Found       | 404 Not Found             |
/// | 3000–3999 | Server          | 500 Internal Server Error |
/// | 5000–5999 | Event log       | 503 Service Unavailable   |
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// A calendar date could not be parsed or lies outside the supported range.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No loaded record carries the given event id.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The event exists but has no subject to resolve content from.
    #[error("event {0} has no subject")]
    NoSubject(EventId),

    /// Error propagated from the backing event log.
    #[error("event log error: {0}")]
    Log(#[from] LogError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JournalError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidDate(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::EventNotFound(_) => 2001,
            Self::NoSubject(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Log(LogError::Unavailable(_)) => 5001,
            Self::Log(LogError::Rejected(_)) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDate(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound(_) | Self::NoSubject(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Log(LogError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Log(LogError::Rejected(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for JournalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_date_is_bad_request() {
        let err = JournalError::InvalidDate("2024-13-40".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
        assert!(err.to_string().contains("2024-13-40"));
    }

    #[test]
    fn log_unavailable_maps_to_503() {
        let err = JournalError::from(LogError::Unavailable("bus closed".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), 5001);
    }

    #[test]
    fn into_response_carries_status() {
        let response = JournalError::EventNotFound(EventId::new(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
