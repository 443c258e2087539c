//! BA document aggregate and its workflow.

mod aggregate;
mod commands;
mod events;
pub mod history;
pub mod kpi;
pub mod numbering;
pub mod outbox;
mod service;
mod state;
pub mod validation;
mod value_objects;
pub mod workflow;

pub use aggregate::{BaDocument, NewDocument};
pub use commands::*;
pub use events::{
    AttachmentAddedData, DecisionRecordedData, DetailsSavedData, DocumentCancelledData,
    DocumentCreatedData, DocumentEvent, DocumentReopenedData, DocumentSubmittedData,
    DraftSavedData, EditLockData, FieldChanges, IntegrationResultRecordedData,
    PartiesAssignedData, SignaturesRecordedData,
};
pub use history::{HistoryAction, ProcessHistoryEntry};
pub use kpi::{ActionItem, KpiCounts};
pub use outbox::{
    GoodsReceiptRequest, IntegrationKind, IntegrationOutbox, IntegrationOutcome,
    MonitoringSyncRequest,
};
pub use service::{DocumentDetail, DocumentService, WorkflowSettings};
pub use state::{DocumentStatus, UnknownStatus};
pub use validation::{Finding, Severity, ValidationReport};
pub use value_objects::{
    Attachment, DetailLines, DocumentType, EditLock, GoodsReceiptStatus, HandoverDetail,
    InspectionDetail, ItemCondition, Milestone, MonitoringSyncStatus, Party, PartyActionStatus,
    PartyProfile, QualityResult, RoleType, Side,
};
pub use workflow::{Decision, StepStatus, StepType, WorkflowStep};

use common::{AggregateId, UserId};
use thiserror::Error;

/// Errors that can occur during document operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document already exists.
    #[error("Document already created")]
    AlreadyCreated,

    /// No document with this id has been created.
    #[error("Document not found")]
    NotCreated,

    /// A mandatory header field is blank.
    #[error("{field} is required")]
    FieldRequired { field: &'static str },

    /// Parties or detail lines failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// The transition table has no such edge.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// The document is not waiting on decisions of this kind.
    #[error("Document is {status}, not waiting on {step_type} decisions")]
    StageNotActive {
        status: DocumentStatus,
        step_type: StepType,
    },

    /// The actor holds no pending step of the requested kind.
    #[error("no pending action for this user ({user}) on {step_type} steps")]
    NoPendingAction { user: UserId, step_type: StepType },

    /// The change is not allowed in the current status.
    #[error("Cannot {action} while document is {status}")]
    NotEditable {
        status: DocumentStatus,
        action: &'static str,
    },

    /// Only recorded decisions move a document to this status.
    #[error("{to} is reached by recording review or approval decisions")]
    WorkflowDriven { to: DocumentStatus },

    /// Cancellation needs a reason.
    #[error("A cancellation reason is required")]
    CancellationReasonRequired,

    /// Another actor holds the edit lock.
    #[error("Document is locked by {holder}")]
    LockedBy { holder: UserId },

    /// Only the holder may release the edit lock.
    #[error("Edit lock is held by {holder}")]
    LockNotHeld { holder: UserId },

    /// Detail lines of the wrong kind for this document.
    #[error("{found} details cannot be saved on a {expected} document")]
    DetailTypeMismatch {
        expected: DocumentType,
        found: DocumentType,
    },

    /// Only handover documents may link an inspection.
    #[error("Only handover documents can link an inspection document")]
    LinkedInspectionNotAllowed,

    /// The linked document does not exist or is not an inspection.
    #[error("Linked document {id} is not an existing inspection document")]
    LinkedInspectionInvalid { id: AggregateId },

    /// Integration results apply to approved handovers only.
    #[error("Integration results can only be recorded on approved handover documents")]
    IntegrationNotApplicable,

    /// No request of this kind is waiting for a result.
    #[error("No {kind} request is awaiting a result")]
    IntegrationNotPending { kind: IntegrationKind },
}

impl DocumentError {
    /// Validation failures, as opposed to workflow refusals.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DocumentError::Validation(_) | DocumentError::FieldRequired { .. }
        )
    }
}
