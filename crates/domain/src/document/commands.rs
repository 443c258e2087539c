//! BA document commands.

use common::{AggregateId, UserId};

use crate::command::Command;

use super::{
    BaDocument, DetailLines, DocumentStatus, DocumentType, FieldChanges, IntegrationKind,
    IntegrationOutcome, PartyProfile, workflow::Decision,
};

/// Command to create a new document in DRAFT.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub document_id: AggregateId,
    pub document_type: DocumentType,
    pub contract_number: Option<String>,
    pub purchase_order_number: String,
    pub vendor_id: String,
    /// Handover only.
    pub inspection_document_id: Option<AggregateId>,
    pub notes: Option<String>,
    pub remarks: Option<String>,
    pub details: Option<DetailLines>,
    pub parties: Vec<PartyProfile>,
    pub created_by: UserId,
}

impl CreateDocument {
    /// Creates a new CreateDocument command with a generated document ID.
    pub fn new(
        document_type: DocumentType,
        purchase_order_number: impl Into<String>,
        vendor_id: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        Self {
            document_id: AggregateId::new(),
            document_type,
            contract_number: None,
            purchase_order_number: purchase_order_number.into(),
            vendor_id: vendor_id.into(),
            inspection_document_id: None,
            notes: None,
            remarks: None,
            details: None,
            parties: Vec::new(),
            created_by,
        }
    }

    pub fn with_parties(mut self, parties: Vec<PartyProfile>) -> Self {
        self.parties = parties;
        self
    }

    pub fn with_details(mut self, details: DetailLines) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_contract(mut self, contract_number: impl Into<String>) -> Self {
        self.contract_number = Some(contract_number.into());
        self
    }

    /// Links the inspection this handover follows.
    pub fn linked_to(mut self, inspection_document_id: AggregateId) -> Self {
        self.inspection_document_id = Some(inspection_document_id);
        self
    }
}

impl Command for CreateDocument {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to change header fields of a draft.
#[derive(Debug, Clone)]
pub struct UpdateFields {
    pub document_id: AggregateId,
    pub changes: FieldChanges,
    pub actor: UserId,
}

impl UpdateFields {
    pub fn new(document_id: AggregateId, changes: FieldChanges, actor: UserId) -> Self {
        Self {
            document_id,
            changes,
            actor,
        }
    }
}

impl Command for UpdateFields {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to replace the party list of a draft.
#[derive(Debug, Clone)]
pub struct AssignParties {
    pub document_id: AggregateId,
    pub parties: Vec<PartyProfile>,
    pub actor: UserId,
}

impl AssignParties {
    pub fn new(document_id: AggregateId, parties: Vec<PartyProfile>, actor: UserId) -> Self {
        Self {
            document_id,
            parties,
            actor,
        }
    }
}

impl Command for AssignParties {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to replace the detail lines of a draft.
#[derive(Debug, Clone)]
pub struct SaveDetails {
    pub document_id: AggregateId,
    pub details: DetailLines,
    pub actor: UserId,
}

impl SaveDetails {
    pub fn new(document_id: AggregateId, details: DetailLines, actor: UserId) -> Self {
        Self {
            document_id,
            details,
            actor,
        }
    }
}

impl Command for SaveDetails {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to list a supporting file on a document.
#[derive(Debug, Clone)]
pub struct AddAttachment {
    pub document_id: AggregateId,
    pub file_name: String,
    pub content_type: String,
    pub storage_ref: String,
    pub actor: UserId,
}

impl Command for AddAttachment {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to submit a draft.
#[derive(Debug, Clone)]
pub struct SubmitDocument {
    pub document_id: AggregateId,
    pub actor: UserId,
}

impl SubmitDocument {
    pub fn new(document_id: AggregateId, actor: UserId) -> Self {
        Self { document_id, actor }
    }
}

impl Command for SubmitDocument {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command carrying a Checker's or Approver's decision.
#[derive(Debug, Clone)]
pub struct RecordDecision {
    pub document_id: AggregateId,
    pub decision: Decision,
    pub comment: Option<String>,
    pub actor: UserId,
}

impl RecordDecision {
    pub fn approve(document_id: AggregateId, actor: UserId) -> Self {
        Self {
            document_id,
            decision: Decision::Approved,
            comment: None,
            actor,
        }
    }

    pub fn reject(document_id: AggregateId, actor: UserId, comment: impl Into<String>) -> Self {
        Self {
            document_id,
            decision: Decision::Rejected,
            comment: Some(comment.into()),
            actor,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl Command for RecordDecision {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to cancel a document.
#[derive(Debug, Clone)]
pub struct CancelDocument {
    pub document_id: AggregateId,
    pub reason: String,
    pub actor: UserId,
}

impl CancelDocument {
    pub fn new(document_id: AggregateId, reason: impl Into<String>, actor: UserId) -> Self {
        Self {
            document_id,
            reason: reason.into(),
            actor,
        }
    }
}

impl Command for CancelDocument {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to send a rejected document back to DRAFT.
#[derive(Debug, Clone)]
pub struct ReopenDocument {
    pub document_id: AggregateId,
    pub comment: Option<String>,
    pub actor: UserId,
}

impl ReopenDocument {
    pub fn new(document_id: AggregateId, actor: UserId) -> Self {
        Self {
            document_id,
            comment: None,
            actor,
        }
    }
}

impl Command for ReopenDocument {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command to move a document to a target status directly.
#[derive(Debug, Clone)]
pub struct TransitionStatus {
    pub document_id: AggregateId,
    pub target: DocumentStatus,
    /// Reason for cancellations, remark for reopens.
    pub comment: Option<String>,
    pub actor: UserId,
}

impl TransitionStatus {
    pub fn new(document_id: AggregateId, target: DocumentStatus, actor: UserId) -> Self {
        Self {
            document_id,
            target,
            comment: None,
            actor,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl Command for TransitionStatus {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command recording whether all signatures have been captured.
#[derive(Debug, Clone)]
pub struct RecordSignatures {
    pub document_id: AggregateId,
    pub complete: bool,
    pub actor: UserId,
}

impl Command for RecordSignatures {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}

/// Command recording what a downstream system did with a request.
#[derive(Debug, Clone)]
pub struct RecordIntegrationResult {
    pub document_id: AggregateId,
    pub kind: IntegrationKind,
    pub outcome: IntegrationOutcome,
    pub message: Option<String>,
}

impl Command for RecordIntegrationResult {
    type Aggregate = BaDocument;

    fn aggregate_id(&self) -> AggregateId {
        self.document_id
    }
}
