//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DocumentError, DomainError};
use integration::IntegrationError;
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Outbox delivery error.
    Integration(IntegrationError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Integration(err) => integration_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg)),
        };

        if status.is_server_error() {
            tracing::error!(error = %body["error"], "internal server error");
        }

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    let message = err.to_string();
    match err {
        DomainError::Document(DocumentError::Validation(report)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            serde_json::json!({ "error": message, "findings": report.findings }),
        ),
        DomainError::Document(DocumentError::FieldRequired { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, error_body(message))
        }
        DomainError::Document(DocumentError::NotCreated)
        | DomainError::AggregateNotFound { .. } => (StatusCode::NOT_FOUND, error_body(message)),
        DomainError::Document(_) => (StatusCode::CONFLICT, error_body(message)),
        DomainError::EventStore(ref store_err) if store_err.is_conflict() => {
            (StatusCode::CONFLICT, error_body(message))
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error_body(message)),
    }
}

fn integration_error_to_response(err: IntegrationError) -> (StatusCode, serde_json::Value) {
    match err {
        IntegrationError::Domain(err) => domain_error_to_response(err),
        IntegrationError::InvalidState { .. } | IntegrationError::AlreadyQueued => {
            (StatusCode::CONFLICT, error_body(err.to_string()))
        }
        IntegrationError::RequestNotFound { .. } => {
            (StatusCode::NOT_FOUND, error_body(err.to_string()))
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error_body(err.to_string())),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        ApiError::Integration(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
