//! Error response formatting
//!
//! Standardized JSON error responses with consistent structure, HTTP status
//! codes, and request IDs for support lookups.

use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
///
/// This is returned to clients for all error cases, ensuring consistent
/// error handling across the API. Provider callback endpoints do NOT use
/// this shape; they answer in each provider's contract instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Create a generic internal server error response
    pub fn internal_error(request_id: Option<String>) -> Self {
        Self::new(
            "internal_error",
            "An internal server error occurred. Please try again later.",
            request_id,
        )
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Build a standardized JSON error response for handlers that return StatusCode + message.
pub fn json_error_response(
    status: StatusCode,
    message: impl Into<String>,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    let message = message.into();
    let error_response = match status.as_u16() {
        404 => ErrorResponse::new("not_found", message, request_id),
        409 => ErrorResponse::new("conflict", message, request_id),
        400..=499 => ErrorResponse::new("validation_error", message, request_id),
        _ => ErrorResponse::internal_error(request_id),
    };

    (status, Json(error_response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_response() {
        let error = ErrorResponse::internal_error(Some("req_456".to_string()));

        assert_eq!(error.error, "internal_error");
        assert_eq!(error.request_id, Some("req_456".to_string()));
        assert!(error.message.contains("internal server error"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let (status, Json(body)) =
            json_error_response(StatusCode::BAD_REQUEST, "order_id is required", None);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "validation_error");
        assert_eq!(body.message, "order_id is required");
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let (status, Json(body)) = json_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "pool timed out",
            Some("req_1".to_string()),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("pool"));
    }
}
