//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request body from the client.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Order core error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    let kind = err.kind();
    let status = match &err {
        DomainError::InvalidArgument(_) | DomainError::VariantNotFound { .. } => {
            StatusCode::BAD_REQUEST
        }
        DomainError::NotFound(_) | DomainError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. } => StatusCode::CONFLICT,
        DomainError::DuplicateRequest => StatusCode::TOO_MANY_REQUESTS,
        DomainError::Storage(_) => {
            tracing::error!(error = %err, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                kind,
                "Internal storage error".to_string(),
            );
        }
    };
    (status, kind, err.to_string())
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
