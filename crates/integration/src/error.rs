//! Integration error types.

use domain::DomainError;
use domain::document::IntegrationKind;
use event_store::EventStoreError;
use thiserror::Error;

use crate::state::JobState;

/// Errors that can occur while delivering integration requests.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The job is in the wrong state for the requested operation.
    #[error("Invalid job state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: JobState },

    /// The job has already been queued.
    #[error("Integration job has already been queued")]
    AlreadyQueued,

    /// The ERP refused or could not take the goods receipt.
    #[error("ERP service error: {0}")]
    Erp(String),

    /// The order monitoring service refused or could not take the stage change.
    #[error("Order monitoring service error: {0}")]
    Monitoring(String),

    /// No request of this kind was emitted for the document.
    #[error("No {kind} request for document {document_id}")]
    RequestNotFound {
        document_id: String,
        kind: IntegrationKind,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntegrationError {
    /// True for failures of the downstream system itself, which are retried.
    pub fn is_downstream(&self) -> bool {
        matches!(self, IntegrationError::Erp(_) | IntegrationError::Monitoring(_))
    }
}

/// Convenience type alias for integration results.
pub type Result<T> = std::result::Result<T, IntegrationError>;
