//! BA document domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::DomainEvent;

use super::outbox::{IntegrationKind, IntegrationOutbox, IntegrationOutcome};
use super::validation::Finding;
use super::value_objects::{Attachment, DetailLines, DocumentType, Party, RoleType};
use super::workflow::{Decision, StepType, WorkflowStep};
use super::DocumentStatus;

/// Events that can occur on a BA document aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DocumentEvent {
    /// Document was created in DRAFT.
    DocumentCreated(DocumentCreatedData),

    /// Header fields were changed while drafting.
    DraftSaved(DraftSavedData),

    /// The party list was replaced.
    PartiesAssigned(PartiesAssignedData),

    /// The detail lines were replaced.
    DetailsSaved(DetailsSavedData),

    /// A supporting file was attached.
    AttachmentAdded(AttachmentAddedData),

    /// Document was submitted and its workflow steps materialized.
    DocumentSubmitted(DocumentSubmittedData),

    /// A Checker or Approver decided on their step.
    DecisionRecorded(DecisionRecordedData),

    /// Document was cancelled.
    DocumentCancelled(DocumentCancelledData),

    /// A rejected document went back to DRAFT.
    DocumentReopened(DocumentReopenedData),

    /// The external signature state changed.
    SignaturesRecorded(SignaturesRecordedData),

    /// A downstream system reported the result of an integration request.
    IntegrationResultRecorded(IntegrationResultRecordedData),

    /// An actor took the edit lock.
    EditLockAcquired(EditLockData),

    /// The edit lock was given up.
    EditLockReleased(EditLockData),
}

impl DomainEvent for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "DocumentCreated",
            DocumentEvent::DraftSaved(_) => "DraftSaved",
            DocumentEvent::PartiesAssigned(_) => "PartiesAssigned",
            DocumentEvent::DetailsSaved(_) => "DetailsSaved",
            DocumentEvent::AttachmentAdded(_) => "AttachmentAdded",
            DocumentEvent::DocumentSubmitted(_) => "DocumentSubmitted",
            DocumentEvent::DecisionRecorded(_) => "DecisionRecorded",
            DocumentEvent::DocumentCancelled(_) => "DocumentCancelled",
            DocumentEvent::DocumentReopened(_) => "DocumentReopened",
            DocumentEvent::SignaturesRecorded(_) => "SignaturesRecorded",
            DocumentEvent::IntegrationResultRecorded(_) => "IntegrationResultRecorded",
            DocumentEvent::EditLockAcquired(_) => "EditLockAcquired",
            DocumentEvent::EditLockReleased(_) => "EditLockReleased",
        }
    }
}

impl DocumentEvent {
    /// The outbox carried by this event, if any.
    pub fn outbox(&self) -> Option<&IntegrationOutbox> {
        match self {
            DocumentEvent::DocumentSubmitted(data) => data.outbox.as_ref(),
            DocumentEvent::DecisionRecorded(data) => data.outbox.as_ref(),
            _ => None,
        }
    }
}

/// Data for DocumentCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCreatedData {
    pub document_id: AggregateId,
    pub document_number: String,
    pub document_type: DocumentType,
    pub contract_number: Option<String>,
    pub purchase_order_number: String,
    pub vendor_id: String,
    /// Handover only: the inspection this handover follows.
    pub inspection_document_id: Option<AggregateId>,
    pub notes: Option<String>,
    pub remarks: Option<String>,
    pub details: DetailLines,
    pub warnings: Vec<Finding>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Header fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_document_id: Option<AggregateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        *self == FieldChanges::default()
    }

    /// Names of the fields being changed, for the history comment.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("contract_number", self.contract_number.is_some()),
            ("purchase_order_number", self.purchase_order_number.is_some()),
            ("vendor_id", self.vendor_id.is_some()),
            ("inspection_document_id", self.inspection_document_id.is_some()),
            ("notes", self.notes.is_some()),
            ("remarks", self.remarks.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, changed)| changed.then_some(name))
        .collect()
    }
}

/// Data for DraftSaved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSavedData {
    pub changes: FieldChanges,
    pub saved_by: UserId,
    pub saved_at: DateTime<Utc>,
}

/// Data for PartiesAssigned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartiesAssignedData {
    pub parties: Vec<Party>,
    pub warnings: Vec<Finding>,
    pub assigned_by: UserId,
    pub assigned_at: DateTime<Utc>,
}

/// Data for DetailsSaved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsSavedData {
    pub details: DetailLines,
    pub warnings: Vec<Finding>,
    pub saved_by: UserId,
    pub saved_at: DateTime<Utc>,
}

/// Data for AttachmentAdded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentAddedData {
    pub attachment: Attachment,
}

/// Data for DocumentSubmitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSubmittedData {
    pub steps: Vec<WorkflowStep>,
    /// Where the document landed after passing through SUBMITTED.
    pub status: DocumentStatus,
    /// Warnings accepted at submission time.
    pub warnings: Vec<Finding>,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
    /// Present when a handover with no steps is approved on submission.
    pub outbox: Option<IntegrationOutbox>,
}

/// Data for DecisionRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecordedData {
    pub step_id: Uuid,
    pub step_type: StepType,
    pub party_id: Uuid,
    pub role: RoleType,
    pub decision: Decision,
    pub comment: Option<String>,
    pub decided_by: UserId,
    pub decided_at: DateTime<Utc>,
    pub from_status: DocumentStatus,
    /// Set when the decision moved the document.
    pub to_status: Option<DocumentStatus>,
    pub outbox: Option<IntegrationOutbox>,
}

/// Data for DocumentCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCancelledData {
    pub reason: String,
    pub from_status: DocumentStatus,
    pub cancelled_by: UserId,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for DocumentReopened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReopenedData {
    /// Revision after the reopen.
    pub revision: u32,
    pub comment: Option<String>,
    pub reopened_by: UserId,
    pub reopened_at: DateTime<Utc>,
}

/// Data for SignaturesRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturesRecordedData {
    pub complete: bool,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

/// Data for IntegrationResultRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationResultRecordedData {
    pub kind: IntegrationKind,
    pub outcome: IntegrationOutcome,
    pub message: Option<String>,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

/// Data for the edit lock events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditLockData {
    pub holder: UserId,
    pub at: DateTime<Utc>,
}
