//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use cloudbox_core::error::{AppError, ErrorKind};

/// Message shown for failures whose details stay server-side.
const GENERIC_MESSAGE: &str = "Something went wrong";

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// An `AppError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

/// Status, error code, and whether the message may be shown to the client.
fn classify(kind: &ErrorKind) -> (StatusCode, &'static str, bool) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", true),
        ErrorKind::SizeMismatch => (StatusCode::BAD_REQUEST, "FILE_SIZE_MISMATCH", true),
        ErrorKind::Authentication => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR", true),
        ErrorKind::Authorization => (StatusCode::FORBIDDEN, "AUTHORIZATION_ERROR", true),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", true),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT", true),
        ErrorKind::QuotaExceeded => (StatusCode::PAYLOAD_TOO_LARGE, "QUOTA_EXCEEDED", true),
        ErrorKind::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", true),
        ErrorKind::Storage | ErrorKind::ServiceUnavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", false)
        }
        ErrorKind::Database
        | ErrorKind::Internal
        | ErrorKind::Configuration
        | ErrorKind::Serialization => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, code, expose) = classify(&err.kind);

        if status.is_server_error() {
            tracing::error!(
                kind = ?err.kind,
                error = %err,
                source = ?err.source,
                "Request failed"
            );
        } else {
            tracing::debug!(kind = ?err.kind, error = %err.message, "Request rejected");
        }

        let message = if expose {
            err.message
        } else {
            GENERIC_MESSAGE.to_string()
        };
        let body = ApiErrorResponse {
            success: false,
            error: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_payload_too_large_with_message() {
        let response = ApiError(AppError::quota_exceeded(10, 4)).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (status, code, expose) = classify(&ErrorKind::Database);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!expose);

        let (status, _, expose) = classify(&ErrorKind::Storage);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!expose);
    }

    #[test]
    fn test_size_mismatch_is_bad_request() {
        let (status, code, expose) = classify(&ErrorKind::SizeMismatch);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "FILE_SIZE_MISMATCH");
        assert!(expose);
    }
}
