//! BA document aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::Aggregate;

use super::{
    DocumentError, DocumentEvent, DocumentStatus,
    events::{
        AttachmentAddedData, DecisionRecordedData, DetailsSavedData, DocumentCancelledData,
        DocumentCreatedData, DocumentReopenedData, DocumentSubmittedData, DraftSavedData,
        EditLockData, FieldChanges, IntegrationResultRecordedData, PartiesAssignedData,
        SignaturesRecordedData,
    },
    outbox::{
        GoodsReceiptRequest, IntegrationKind, IntegrationOutbox, IntegrationOutcome,
        MonitoringSyncRequest, STAGE_DELIVERED, STAGE_HANDED_OVER, STAGE_INSPECTED,
    },
    validation::{self, ValidationReport},
    value_objects::{
        Attachment, DetailLines, DocumentType, EditLock, GoodsReceiptStatus, Milestone,
        MonitoringSyncStatus, Party, PartyActionStatus, PartyProfile, RoleType,
    },
    workflow::{self, Decision, StageOutcome, StepType, WorkflowStep},
};

/// Everything needed to open a new document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub document_id: AggregateId,
    pub document_number: String,
    pub document_type: DocumentType,
    pub contract_number: Option<String>,
    pub purchase_order_number: String,
    pub vendor_id: String,
    pub inspection_document_id: Option<AggregateId>,
    pub notes: Option<String>,
    pub remarks: Option<String>,
    pub details: Option<DetailLines>,
    pub parties: Vec<PartyProfile>,
}

/// BA document aggregate root.
///
/// Holds the header, parties, detail lines and materialized workflow steps of
/// one Berita Acara, plus its lifecycle milestones and integration statuses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BaDocument {
    id: Option<AggregateId>,

    /// Current stream version; also the optimistic-lock token.
    version: Version,

    document_number: String,
    document_type: DocumentType,
    status: DocumentStatus,

    /// Bumped on every reopen after rejection.
    revision: u32,

    contract_number: Option<String>,
    purchase_order_number: String,
    vendor_id: String,
    inspection_document_id: Option<AggregateId>,
    notes: Option<String>,
    remarks: Option<String>,

    parties: Vec<Party>,
    details: DetailLines,
    steps: Vec<WorkflowStep>,
    attachments: Vec<Attachment>,

    submitted: Option<Milestone>,
    review_started: Option<Milestone>,
    approval_started: Option<Milestone>,
    final_approved: Option<Milestone>,
    rejected: Option<Milestone>,
    cancelled: Option<Milestone>,
    cancellation_reason: Option<String>,
    rejection_reason: Option<String>,

    goods_receipt_status: GoodsReceiptStatus,
    monitoring_sync_status: MonitoringSyncStatus,
    integration_outbox: Option<IntegrationOutbox>,

    /// Set from outside; informational only.
    signatures_complete: bool,
    edit_lock: Option<EditLock>,

    created: Option<Milestone>,
    modified: Option<Milestone>,
}

impl Aggregate for BaDocument {
    type Event = DocumentEvent;
    type Error = DocumentError;

    fn aggregate_type() -> &'static str {
        "BaDocument"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(data) => self.apply_created(data),
            DocumentEvent::DraftSaved(data) => self.apply_draft_saved(data),
            DocumentEvent::PartiesAssigned(data) => {
                self.parties = data.parties;
                self.touch(data.assigned_by, data.assigned_at);
            }
            DocumentEvent::DetailsSaved(data) => {
                self.details = data.details;
                self.touch(data.saved_by, data.saved_at);
            }
            DocumentEvent::AttachmentAdded(data) => {
                self.touch(data.attachment.uploaded_by.clone(), data.attachment.uploaded_at);
                self.attachments.push(data.attachment);
            }
            DocumentEvent::DocumentSubmitted(data) => self.apply_submitted(data),
            DocumentEvent::DecisionRecorded(data) => self.apply_decision(data),
            DocumentEvent::DocumentCancelled(data) => {
                self.status = DocumentStatus::Cancelled;
                self.edit_lock = None;
                self.cancellation_reason = Some(data.reason);
                self.cancelled = Some(Milestone::new(data.cancelled_at, data.cancelled_by.clone()));
                self.touch(data.cancelled_by, data.cancelled_at);
            }
            DocumentEvent::DocumentReopened(data) => self.apply_reopened(data),
            DocumentEvent::SignaturesRecorded(data) => {
                self.signatures_complete = data.complete;
                self.touch(data.recorded_by, data.recorded_at);
            }
            DocumentEvent::IntegrationResultRecorded(data) => {
                match data.kind {
                    IntegrationKind::GoodsReceipt => {
                        self.goods_receipt_status = data.outcome.goods_receipt_status();
                    }
                    IntegrationKind::MonitoringSync => {
                        self.monitoring_sync_status = data.outcome.monitoring_sync_status();
                    }
                }
                self.touch(data.recorded_by, data.recorded_at);
            }
            DocumentEvent::EditLockAcquired(data) => {
                self.edit_lock = Some(EditLock {
                    holder: data.holder,
                    acquired_at: data.at,
                });
            }
            DocumentEvent::EditLockReleased(_) => {
                self.edit_lock = None;
            }
        }
    }
}

// Query methods
impl BaDocument {
    pub fn document_number(&self) -> &str {
        &self.document_number
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn contract_number(&self) -> Option<&str> {
        self.contract_number.as_deref()
    }

    pub fn purchase_order_number(&self) -> &str {
        &self.purchase_order_number
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    pub fn inspection_document_id(&self) -> Option<AggregateId> {
        self.inspection_document_id
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn details(&self) -> &DetailLines {
        &self.details
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn submitted(&self) -> Option<&Milestone> {
        self.submitted.as_ref()
    }

    pub fn review_started(&self) -> Option<&Milestone> {
        self.review_started.as_ref()
    }

    pub fn approval_started(&self) -> Option<&Milestone> {
        self.approval_started.as_ref()
    }

    pub fn final_approved(&self) -> Option<&Milestone> {
        self.final_approved.as_ref()
    }

    pub fn rejected(&self) -> Option<&Milestone> {
        self.rejected.as_ref()
    }

    pub fn cancelled(&self) -> Option<&Milestone> {
        self.cancelled.as_ref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn goods_receipt_status(&self) -> GoodsReceiptStatus {
        self.goods_receipt_status
    }

    pub fn monitoring_sync_status(&self) -> MonitoringSyncStatus {
        self.monitoring_sync_status
    }

    /// Requests emitted on final approval of a handover.
    pub fn integration_outbox(&self) -> Option<&IntegrationOutbox> {
        self.integration_outbox.as_ref()
    }

    pub fn signatures_complete(&self) -> bool {
        self.signatures_complete
    }

    pub fn edit_lock(&self) -> Option<&EditLock> {
        self.edit_lock.as_ref()
    }

    pub fn created(&self) -> Option<&Milestone> {
        self.created.as_ref()
    }

    pub fn modified(&self) -> Option<&Milestone> {
        self.modified.as_ref()
    }

    /// Role the user plays on this document, if any.
    pub fn role_of(&self, user: &UserId) -> Option<RoleType> {
        self.parties
            .iter()
            .find(|p| p.user_id() == user)
            .map(|p| p.role())
    }

    /// The user's pending step in the stage the document is waiting on.
    pub fn pending_step_for(&self, user: &UserId) -> Option<&WorkflowStep> {
        let step_type = self.status.active_step_type()?;
        workflow::find_pending_step(&self.steps, step_type, user)
    }
}

// Command methods (return events)
impl BaDocument {
    /// Opens a new document in DRAFT, assigning parties in the same append
    /// when any are supplied.
    pub fn create(
        &self,
        new: &NewDocument,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        if self.id.is_some() {
            return Err(DocumentError::AlreadyCreated);
        }

        require("purchase_order_number", &new.purchase_order_number)?;
        require("vendor_id", &new.vendor_id)?;

        if new.inspection_document_id.is_some() && new.document_type != DocumentType::Handover {
            return Err(DocumentError::LinkedInspectionNotAllowed);
        }

        let details = match &new.details {
            Some(details) => {
                check_detail_type(new.document_type, details)?;
                details.clone()
            }
            None => DetailLines::empty_for(new.document_type),
        };
        let detail_warnings = if details.is_empty() {
            Vec::new()
        } else {
            accept(validation::validate_details(&details))?.warnings()
        };

        let mut events = vec![DocumentEvent::DocumentCreated(DocumentCreatedData {
            document_id: new.document_id,
            document_number: new.document_number.clone(),
            document_type: new.document_type,
            contract_number: new.contract_number.clone(),
            purchase_order_number: new.purchase_order_number.trim().to_string(),
            vendor_id: new.vendor_id.trim().to_string(),
            inspection_document_id: new.inspection_document_id,
            notes: new.notes.clone(),
            remarks: new.remarks.clone(),
            details,
            warnings: detail_warnings,
            created_by: actor.clone(),
            created_at: now,
        })];

        if !new.parties.is_empty() {
            events.push(parties_assigned(&new.parties, actor, now)?);
        }

        Ok(events)
    }

    /// Changes header fields while drafting. No change, no event.
    pub fn update_fields(
        &self,
        changes: &FieldChanges,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_editable("update fields")?;

        if changes.is_empty() {
            return Ok(vec![]);
        }
        if let Some(po) = &changes.purchase_order_number {
            require("purchase_order_number", po)?;
        }
        if let Some(vendor) = &changes.vendor_id {
            require("vendor_id", vendor)?;
        }
        if changes.inspection_document_id.is_some()
            && self.document_type != DocumentType::Handover
        {
            return Err(DocumentError::LinkedInspectionNotAllowed);
        }

        Ok(vec![DocumentEvent::DraftSaved(DraftSavedData {
            changes: changes.clone(),
            saved_by: actor.clone(),
            saved_at: now,
        })])
    }

    /// Replaces the party list.
    pub fn assign_parties(
        &self,
        profiles: &[PartyProfile],
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_editable("assign parties")?;

        Ok(vec![parties_assigned(profiles, actor, now)?])
    }

    /// Replaces the detail lines.
    pub fn save_details(
        &self,
        details: &DetailLines,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_editable("save detail lines")?;
        check_detail_type(self.document_type, details)?;

        let report = accept(validation::validate_details(details))?;

        Ok(vec![DocumentEvent::DetailsSaved(DetailsSavedData {
            details: details.clone(),
            warnings: report.warnings(),
            saved_by: actor.clone(),
            saved_at: now,
        })])
    }

    /// Lists a supporting file on the document.
    pub fn add_attachment(
        &self,
        file_name: &str,
        content_type: &str,
        storage_ref: &str,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_open("add attachment")?;
        require("file_name", file_name)?;
        require("storage_ref", storage_ref)?;

        Ok(vec![DocumentEvent::AttachmentAdded(AttachmentAddedData {
            attachment: Attachment {
                id: Uuid::new_v4(),
                file_name: file_name.trim().to_string(),
                content_type: content_type.to_string(),
                storage_ref: storage_ref.to_string(),
                uploaded_by: actor.clone(),
                uploaded_at: now,
            },
        })])
    }

    /// Re-validates and hands the document in, materializing its steps.
    ///
    /// The document passes through SUBMITTED and lands in the first stage
    /// that has steps; with no steps at all it is approved outright.
    pub fn submit(
        &self,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_transition(DocumentStatus::Submitted)?;

        let profiles: Vec<PartyProfile> = self.parties.iter().map(|p| p.profile.clone()).collect();
        let report = accept(
            validation::validate_parties(&profiles).merge(validation::validate_details(&self.details)),
        )?;

        let steps = workflow::materialize_steps(&self.parties);
        let mut path = vec![DocumentStatus::Submitted];
        if workflow::has_steps(&steps, StepType::Review) {
            path.push(DocumentStatus::UnderReview);
        } else {
            path.push(DocumentStatus::UnderApproval);
            if !workflow::has_steps(&steps, StepType::Approve) {
                path.push(DocumentStatus::Approved);
            }
        }
        for hop in path.windows(2) {
            if !hop[0].can_transition_to(hop[1]) {
                return Err(DocumentError::InvalidTransition {
                    from: hop[0],
                    to: hop[1],
                });
            }
        }

        let status = *path.last().unwrap_or(&DocumentStatus::Submitted);
        let outbox = (status == DocumentStatus::Approved)
            .then(|| self.outbox_for_approval())
            .flatten();

        Ok(vec![DocumentEvent::DocumentSubmitted(DocumentSubmittedData {
            steps,
            status,
            warnings: report.warnings(),
            submitted_by: actor.clone(),
            submitted_at: now,
            outbox,
        })])
    }

    /// Records a Checker's or Approver's decision on their pending step.
    pub fn record_decision(
        &self,
        step_type: StepType,
        decision: Decision,
        comment: Option<&str>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;

        if self.status.active_step_type() != Some(step_type) {
            return Err(DocumentError::StageNotActive {
                status: self.status,
                step_type,
            });
        }

        let pending = workflow::find_pending_step(&self.steps, step_type, actor).ok_or_else(|| {
            DocumentError::NoPendingAction {
                user: actor.clone(),
                step_type,
            }
        })?;

        let mut steps = self.steps.clone();
        let mut decided = pending.clone();
        decided.status = decision.step_status();
        if let Some(step) = steps.iter_mut().find(|s| s.id == decided.id) {
            *step = decided.clone();
        }

        let to_status = match workflow::evaluate_stage(&steps, &decided) {
            StageOutcome::Rejected => Some(DocumentStatus::Rejected),
            StageOutcome::Complete => match step_type {
                StepType::Review if workflow::has_steps(&steps, StepType::Approve) => {
                    Some(DocumentStatus::UnderApproval)
                }
                StepType::Review | StepType::Approve => Some(DocumentStatus::Approved),
            },
            StageOutcome::Waiting => None,
        };
        if let Some(to) = to_status {
            self.ensure_transition(to)?;
        }

        let outbox = (to_status == Some(DocumentStatus::Approved))
            .then(|| self.outbox_for_approval())
            .flatten();

        Ok(vec![DocumentEvent::DecisionRecorded(DecisionRecordedData {
            step_id: decided.id,
            step_type,
            party_id: decided.party_id,
            role: decided.role,
            decision,
            comment: comment.map(str::trim).filter(|c| !c.is_empty()).map(String::from),
            decided_by: actor.clone(),
            decided_at: now,
            from_status: self.status,
            to_status,
            outbox,
        })])
    }

    /// Withdraws the document; only before review starts.
    ///
    /// SUBMITTED is left within the submitting command, so in practice only
    /// drafts are cancelled.
    pub fn cancel(
        &self,
        reason: &str,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_transition(DocumentStatus::Cancelled)?;

        if reason.trim().is_empty() {
            return Err(DocumentError::CancellationReasonRequired);
        }

        Ok(vec![DocumentEvent::DocumentCancelled(DocumentCancelledData {
            reason: reason.trim().to_string(),
            from_status: self.status,
            cancelled_by: actor.clone(),
            cancelled_at: now,
        })])
    }

    /// Sends a rejected document back to DRAFT as a new revision.
    pub fn reopen(
        &self,
        comment: Option<&str>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_transition(DocumentStatus::Draft)?;

        Ok(vec![DocumentEvent::DocumentReopened(DocumentReopenedData {
            revision: self.revision + 1,
            comment: comment.map(String::from),
            reopened_by: actor.clone(),
            reopened_at: now,
        })])
    }

    /// Moves the document to `target` when a plain transition can do it.
    ///
    /// The table is checked before anything else. Statuses that only
    /// decisions reach are refused.
    pub fn transition(
        &self,
        target: DocumentStatus,
        comment: Option<&str>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_created()?;
        self.ensure_transition(target)?;

        match target {
            DocumentStatus::Submitted => self.submit(actor, now),
            DocumentStatus::Cancelled => self.cancel(comment.unwrap_or_default(), actor, now),
            DocumentStatus::Draft => self.reopen(comment, actor, now),
            DocumentStatus::UnderReview
            | DocumentStatus::UnderApproval
            | DocumentStatus::Approved
            | DocumentStatus::Rejected => Err(DocumentError::WorkflowDriven { to: target }),
        }
    }

    /// Records the externally captured signature state.
    pub fn record_signatures(
        &self,
        complete: bool,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_open("record signatures")?;

        Ok(vec![DocumentEvent::SignaturesRecorded(SignaturesRecordedData {
            complete,
            recorded_by: actor.clone(),
            recorded_at: now,
        })])
    }

    /// Records what a downstream system did with an outbox request.
    pub fn record_integration_result(
        &self,
        kind: IntegrationKind,
        outcome: IntegrationOutcome,
        message: Option<&str>,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_created()?;

        if self.status != DocumentStatus::Approved || self.document_type != DocumentType::Handover
        {
            return Err(DocumentError::IntegrationNotApplicable);
        }

        let awaiting = match kind {
            IntegrationKind::GoodsReceipt => matches!(
                self.goods_receipt_status,
                GoodsReceiptStatus::Pending | GoodsReceiptStatus::Failed
            ),
            IntegrationKind::MonitoringSync => matches!(
                self.monitoring_sync_status,
                MonitoringSyncStatus::Pending | MonitoringSyncStatus::Failed
            ),
        };
        if !awaiting {
            return Err(DocumentError::IntegrationNotPending { kind });
        }

        Ok(vec![DocumentEvent::IntegrationResultRecorded(
            IntegrationResultRecordedData {
                kind,
                outcome,
                message: message.map(String::from),
                recorded_by: actor.clone(),
                recorded_at: now,
            },
        )])
    }

    /// Takes the edit lock. Taking it again is a no-op.
    ///
    /// Only drafts can be locked, and the lock goes away with the next status
    /// change, so a draft lock never outlives submission.
    pub fn acquire_lock(
        &self,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_writable_by(actor)?;
        self.ensure_editable("lock")?;

        if self.edit_lock.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![DocumentEvent::EditLockAcquired(EditLockData {
            holder: actor.clone(),
            at: now,
        })])
    }

    /// Gives up the edit lock. Releasing an unlocked document is a no-op.
    pub fn release_lock(
        &self,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentEvent>, DocumentError> {
        self.ensure_created()?;

        match &self.edit_lock {
            None => Ok(vec![]),
            Some(lock) if &lock.holder != actor => Err(DocumentError::LockNotHeld {
                holder: lock.holder.clone(),
            }),
            Some(_) => Ok(vec![DocumentEvent::EditLockReleased(EditLockData {
                holder: actor.clone(),
                at: now,
            })]),
        }
    }
}

// Guards
impl BaDocument {
    fn ensure_created(&self) -> Result<AggregateId, DocumentError> {
        self.id.ok_or(DocumentError::NotCreated)
    }

    /// Created, and not locked by someone else.
    fn ensure_writable_by(&self, actor: &UserId) -> Result<(), DocumentError> {
        self.ensure_created()?;
        match &self.edit_lock {
            Some(lock) if &lock.holder != actor => Err(DocumentError::LockedBy {
                holder: lock.holder.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), DocumentError> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(DocumentError::NotEditable {
                status: self.status,
                action,
            })
        }
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), DocumentError> {
        if self.status.is_closed() {
            Err(DocumentError::NotEditable {
                status: self.status,
                action,
            })
        } else {
            Ok(())
        }
    }

    fn ensure_transition(&self, to: DocumentStatus) -> Result<(), DocumentError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(DocumentError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    fn outbox_for_approval(&self) -> Option<IntegrationOutbox> {
        let document_id = self.id?;
        let details = self.details.handover_lines()?.to_vec();

        let previous_stage = if self.inspection_document_id.is_some() {
            STAGE_INSPECTED
        } else {
            STAGE_DELIVERED
        };

        Some(IntegrationOutbox {
            goods_receipt: GoodsReceiptRequest {
                document_id,
                document_number: self.document_number.clone(),
                purchase_order_number: self.purchase_order_number.clone(),
                vendor_id: self.vendor_id.clone(),
                details,
            },
            monitoring_sync: MonitoringSyncRequest {
                document_id,
                purchase_order_number: self.purchase_order_number.clone(),
                previous_stage: previous_stage.to_string(),
                new_stage: STAGE_HANDED_OVER.to_string(),
                sync_status: MonitoringSyncStatus::Pending,
            },
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), DocumentError> {
    if value.trim().is_empty() {
        Err(DocumentError::FieldRequired { field })
    } else {
        Ok(())
    }
}

fn accept(report: ValidationReport) -> Result<ValidationReport, DocumentError> {
    report.into_result().map_err(DocumentError::Validation)
}

fn check_detail_type(expected: DocumentType, details: &DetailLines) -> Result<(), DocumentError> {
    let found = details.document_type();
    if found == expected {
        Ok(())
    } else {
        Err(DocumentError::DetailTypeMismatch { expected, found })
    }
}

fn parties_assigned(
    profiles: &[PartyProfile],
    actor: &UserId,
    now: DateTime<Utc>,
) -> Result<DocumentEvent, DocumentError> {
    let report = accept(validation::validate_parties(profiles))?;

    Ok(DocumentEvent::PartiesAssigned(PartiesAssignedData {
        parties: profiles.iter().cloned().map(Party::assign).collect(),
        warnings: report.warnings(),
        assigned_by: actor.clone(),
        assigned_at: now,
    }))
}

// Apply event helpers
impl BaDocument {
    fn touch(&mut self, by: UserId, at: DateTime<Utc>) {
        self.modified = Some(Milestone::new(at, by));
    }

    fn apply_created(&mut self, data: DocumentCreatedData) {
        self.id = Some(data.document_id);
        self.document_number = data.document_number;
        self.document_type = data.document_type;
        self.status = DocumentStatus::Draft;
        self.revision = 1;
        self.contract_number = data.contract_number;
        self.purchase_order_number = data.purchase_order_number;
        self.vendor_id = data.vendor_id;
        self.inspection_document_id = data.inspection_document_id;
        self.notes = data.notes;
        self.remarks = data.remarks;
        self.details = data.details;
        self.created = Some(Milestone::new(data.created_at, data.created_by.clone()));
        self.touch(data.created_by, data.created_at);
    }

    fn apply_draft_saved(&mut self, data: DraftSavedData) {
        let changes = data.changes;
        if let Some(value) = changes.contract_number {
            self.contract_number = Some(value);
        }
        if let Some(value) = changes.purchase_order_number {
            self.purchase_order_number = value.trim().to_string();
        }
        if let Some(value) = changes.vendor_id {
            self.vendor_id = value.trim().to_string();
        }
        if let Some(value) = changes.inspection_document_id {
            self.inspection_document_id = Some(value);
        }
        if let Some(value) = changes.notes {
            self.notes = Some(value);
        }
        if let Some(value) = changes.remarks {
            self.remarks = Some(value);
        }
        self.touch(data.saved_by, data.saved_at);
    }

    fn apply_submitted(&mut self, data: DocumentSubmittedData) {
        let by = data.submitted_by;
        let at = data.submitted_at;

        self.steps = data.steps;
        self.submitted = Some(Milestone::new(at, by.clone()));
        self.status = DocumentStatus::Submitted;

        match data.status {
            DocumentStatus::Approved => {
                self.enter(DocumentStatus::UnderApproval, &by, at);
                self.enter(DocumentStatus::Approved, &by, at);
            }
            status => self.enter(status, &by, at),
        }
        self.attach_outbox(data.outbox);
        self.touch(by, at);
    }

    fn apply_decision(&mut self, data: DecisionRecordedData) {
        let step_status = data.decision.step_status();
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == data.step_id) {
            step.status = step_status;
            step.acted_at = Some(data.decided_at);
            step.comment = data.comment.clone();
        }
        if let Some(party) = self.parties.iter_mut().find(|p| p.id == data.party_id) {
            party.action_status = match data.decision {
                Decision::Approved => PartyActionStatus::Approved,
                Decision::Rejected => PartyActionStatus::Rejected,
            };
            party.action_at = Some(data.decided_at);
            party.action_comment = data.comment.clone();
        }

        if let Some(to) = data.to_status {
            if to == DocumentStatus::Rejected {
                self.rejection_reason = data.comment;
            }
            self.enter(to, &data.decided_by, data.decided_at);
        }
        self.attach_outbox(data.outbox);
        self.touch(data.decided_by, data.decided_at);
    }

    fn apply_reopened(&mut self, data: DocumentReopenedData) {
        self.status = DocumentStatus::Draft;
        self.edit_lock = None;
        self.revision = data.revision;
        self.steps.clear();
        for party in &mut self.parties {
            party.reset_action();
        }
        self.submitted = None;
        self.review_started = None;
        self.approval_started = None;
        self.rejected = None;
        self.rejection_reason = None;
        self.touch(data.reopened_by, data.reopened_at);
    }

    /// Sets the status and the milestone and party state that go with it.
    fn enter(&mut self, status: DocumentStatus, by: &UserId, at: DateTime<Utc>) {
        let milestone = Some(Milestone::new(at, by.clone()));
        match status {
            DocumentStatus::UnderReview => {
                self.review_started = milestone;
                self.start_parties(StepType::Review);
            }
            DocumentStatus::UnderApproval => {
                self.approval_started = milestone;
                self.start_parties(StepType::Approve);
            }
            DocumentStatus::Approved => self.final_approved = milestone,
            DocumentStatus::Rejected => self.rejected = milestone,
            _ => {}
        }
        self.status = status;
        self.edit_lock = None;
    }

    fn start_parties(&mut self, step_type: StepType) {
        for party in &mut self.parties {
            if party.role().step_type() == Some(step_type)
                && party.action_status == PartyActionStatus::Pending
            {
                party.action_status = PartyActionStatus::InProgress;
            }
        }
    }

    fn attach_outbox(&mut self, outbox: Option<IntegrationOutbox>) {
        if let Some(outbox) = outbox {
            self.goods_receipt_status = GoodsReceiptStatus::Pending;
            self.monitoring_sync_status = MonitoringSyncStatus::Pending;
            self.integration_outbox = Some(outbox);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{HandoverDetail, ItemCondition, StepStatus};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    fn handover_line() -> HandoverDetail {
        HandoverDetail {
            material_code: Some("MAT-002".to_string()),
            material_description: "Transformer 20kV".to_string(),
            unit_of_measure: "UNIT".to_string(),
            ordered_quantity: dec!(10),
            already_handed_over_quantity: dec!(0),
            this_handover_quantity: dec!(10),
            remaining_quantity: dec!(0),
            handover_date: NaiveDate::from_ymd_opt(2026, 10, 2),
            delivery_location: "UP3 Bekasi".to_string(),
            verified_by_both_parties: true,
            condition: ItemCondition::Good,
            notes: None,
        }
    }

    fn makers() -> Vec<PartyProfile> {
        vec![
            PartyProfile::new(RoleType::MakerVendor, "v.maker", "Vera"),
            PartyProfile::new(RoleType::MakerPln, "p.maker", "Dewi"),
        ]
    }

    fn new_handover(parties: Vec<PartyProfile>) -> NewDocument {
        NewDocument {
            document_id: AggregateId::new(),
            document_number: "BAST/2026/10/0001".to_string(),
            document_type: DocumentType::Handover,
            contract_number: Some("K-2026-17".to_string()),
            purchase_order_number: "PO-4500012345".to_string(),
            vendor_id: "V-100".to_string(),
            inspection_document_id: None,
            notes: None,
            remarks: None,
            details: Some(DetailLines::Handover(vec![handover_line()])),
            parties,
        }
    }

    fn apply_all(doc: &mut BaDocument, events: Result<Vec<DocumentEvent>, DocumentError>) {
        doc.apply_events(events.unwrap());
    }

    fn created(parties: Vec<PartyProfile>) -> BaDocument {
        let mut doc = BaDocument::default();
        let events = doc.create(&new_handover(parties), &user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        doc
    }

    fn with_reviewer_and_approver() -> Vec<PartyProfile> {
        let mut parties = makers();
        parties.push(PartyProfile::new(RoleType::CheckerPln, "p.check", "Putu"));
        parties.push(PartyProfile::new(RoleType::ApproverPln, "p.appr", "Ayu"));
        parties
    }

    #[test]
    fn create_with_parties_emits_two_events() {
        let doc = BaDocument::default();
        let events = doc
            .create(&new_handover(makers()), &user("v.maker"), Utc::now())
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DocumentEvent::DocumentCreated(_)));
        assert!(matches!(events[1], DocumentEvent::PartiesAssigned(_)));
    }

    #[test]
    fn create_twice_fails() {
        let doc = created(makers());
        let result = doc.create(&new_handover(makers()), &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::AlreadyCreated)));
    }

    #[test]
    fn inspection_cannot_link_an_inspection() {
        let mut new = new_handover(vec![]);
        new.document_type = DocumentType::Inspection;
        new.details = None;
        new.inspection_document_id = Some(AggregateId::new());

        let result = BaDocument::default().create(&new, &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::LinkedInspectionNotAllowed)));
    }

    #[test]
    fn new_document_starts_in_draft() {
        let doc = created(makers());

        assert_eq!(doc.status(), DocumentStatus::Draft);
        assert_eq!(doc.revision(), 1);
        assert_eq!(doc.parties().len(), 2);
        assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::NotApplicable);
        assert_eq!(doc.role_of(&user("p.maker")), Some(RoleType::MakerPln));
    }

    #[test]
    fn submit_enters_review_when_checkers_exist() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::UnderReview);
        assert_eq!(doc.steps().len(), 2);
        assert!(doc.submitted().is_some());
        assert!(doc.review_started().is_some());
        let checker = doc.parties().iter().find(|p| p.role() == RoleType::CheckerPln).unwrap();
        assert_eq!(checker.action_status, PartyActionStatus::InProgress);
        let approver = doc.parties().iter().find(|p| p.role() == RoleType::ApproverPln).unwrap();
        assert_eq!(approver.action_status, PartyActionStatus::Pending);
    }

    #[test]
    fn submit_without_steps_is_vacuously_approved() {
        let mut doc = created(makers());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::Approved);
        assert!(doc.approval_started().is_some());
        assert!(doc.final_approved().is_some());
        assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Pending);
        assert_eq!(doc.monitoring_sync_status(), MonitoringSyncStatus::Pending);
    }

    #[test]
    fn decision_in_wrong_stage_is_refused() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let result = doc.record_decision(
            StepType::Approve,
            Decision::Approved,
            None,
            &user("p.appr"),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::StageNotActive { .. })));
    }

    #[test]
    fn decision_without_pending_step_is_refused() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let err = doc
            .record_decision(
                StepType::Review,
                Decision::Approved,
                None,
                &user("p.appr"),
                Utc::now(),
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("no pending action for this user"));
    }

    #[test]
    fn review_then_approval_reaches_approved_with_outbox() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let events = doc.record_decision(
            StepType::Review,
            Decision::Approved,
            Some("ok"),
            &user("p.check"),
            Utc::now(),
        );
        apply_all(&mut doc, events);
        assert_eq!(doc.status(), DocumentStatus::UnderApproval);

        let events = doc.record_decision(
            StepType::Approve,
            Decision::Approved,
            None,
            &user("p.appr"),
            Utc::now(),
        );
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::Approved);
        let outbox = doc.integration_outbox().unwrap();
        assert_eq!(outbox.monitoring_sync.previous_stage, STAGE_DELIVERED);
        assert_eq!(outbox.monitoring_sync.new_stage, STAGE_HANDED_OVER);
        assert_eq!(outbox.goods_receipt.details.len(), 1);
        assert!(doc.steps().iter().all(|s| s.status == StepStatus::Approved));
    }

    #[test]
    fn rejection_keeps_later_steps_pending() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let events = doc.record_decision(
            StepType::Review,
            Decision::Rejected,
            Some("quantity mismatch"),
            &user("p.check"),
            Utc::now(),
        );
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::Rejected);
        assert_eq!(doc.rejection_reason(), Some("quantity mismatch"));
        let approve = doc.steps().iter().find(|s| s.step_type == StepType::Approve).unwrap();
        assert_eq!(approve.status, StepStatus::Pending);
    }

    #[test]
    fn reopen_resets_workflow_and_bumps_revision() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        let events = doc.record_decision(
            StepType::Review,
            Decision::Rejected,
            Some("redo"),
            &user("p.check"),
            Utc::now(),
        );
        apply_all(&mut doc, events);

        let events = doc.reopen(None, &user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::Draft);
        assert_eq!(doc.revision(), 2);
        assert!(doc.steps().is_empty());
        assert!(doc.rejected().is_none());
        assert!(
            doc.parties()
                .iter()
                .filter(|p| p.action_required)
                .all(|p| p.action_status == PartyActionStatus::Pending)
        );
    }

    #[test]
    fn cancel_requires_reason_and_allowed_status() {
        let doc = created(makers());

        let result = doc.cancel("  ", &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::CancellationReasonRequired)));

        let mut doc = doc;
        let events = doc.cancel("PO withdrawn", &user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        assert_eq!(doc.status(), DocumentStatus::Cancelled);
        assert_eq!(doc.cancellation_reason(), Some("PO withdrawn"));

        let result = doc.cancel("again", &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::InvalidTransition { .. })));
    }

    #[test]
    fn transition_refuses_workflow_driven_targets() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let result = doc.transition(
            DocumentStatus::UnderApproval,
            None,
            &user("p.check"),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::WorkflowDriven { .. })));

        let result = doc.transition(DocumentStatus::Cancelled, Some("late"), &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::InvalidTransition { .. })));
    }

    #[test]
    fn edits_are_refused_after_submission() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let result = doc.assign_parties(&makers(), &user("v.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::NotEditable { .. })));
    }

    #[test]
    fn detail_variant_must_match_document_type() {
        let doc = created(makers());
        let result = doc.save_details(
            &DetailLines::Inspection(vec![]),
            &user("v.maker"),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::DetailTypeMismatch { .. })));
    }

    #[test]
    fn lock_blocks_other_actors_only() {
        let mut doc = created(makers());
        let events = doc.acquire_lock(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);

        let result = doc.update_fields(
            &FieldChanges {
                notes: Some("by someone else".to_string()),
                ..Default::default()
            },
            &user("p.maker"),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::LockedBy { .. })));

        let result = doc.release_lock(&user("p.maker"), Utc::now());
        assert!(matches!(result, Err(DocumentError::LockNotHeld { .. })));

        assert_eq!(
            doc.update_fields(
                &FieldChanges {
                    notes: Some("by holder".to_string()),
                    ..Default::default()
                },
                &user("v.maker"),
                Utc::now(),
            )
            .unwrap()
            .len(),
            1
        );
    }

    #[test]
    fn draft_lock_is_dropped_on_submit() {
        let mut doc = created(with_reviewer_and_approver());
        let events = doc.acquire_lock(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        assert!(doc.edit_lock().is_some());

        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        assert_eq!(doc.status(), DocumentStatus::UnderReview);
        assert!(doc.edit_lock().is_none());

        let events = doc.record_decision(
            StepType::Review,
            Decision::Approved,
            None,
            &user("p.check"),
            Utc::now(),
        );
        apply_all(&mut doc, events);
        assert_eq!(doc.status(), DocumentStatus::UnderApproval);

        // Locks are for drafts only
        let result = doc.acquire_lock(&user("p.appr"), Utc::now());
        assert!(matches!(result, Err(DocumentError::NotEditable { .. })));
    }

    #[test]
    fn cancel_drops_the_lock() {
        let mut doc = created(makers());
        let events = doc.acquire_lock(&user("p.maker"), Utc::now());
        apply_all(&mut doc, events);

        let events = doc.cancel("duplicate of BAST/2026/10/0002", &user("p.maker"), Utc::now());
        apply_all(&mut doc, events);

        assert_eq!(doc.status(), DocumentStatus::Cancelled);
        assert!(doc.edit_lock().is_none());
    }

    #[test]
    fn integration_results_only_on_approved_handover() {
        let doc = created(makers());
        let result = doc.record_integration_result(
            IntegrationKind::GoodsReceipt,
            IntegrationOutcome::Succeeded,
            None,
            &UserId::system(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::IntegrationNotApplicable)));

        let mut doc = doc;
        let events = doc.submit(&user("v.maker"), Utc::now());
        apply_all(&mut doc, events);
        let events = doc.record_integration_result(
            IntegrationKind::GoodsReceipt,
            IntegrationOutcome::Succeeded,
            Some("GR 5000001"),
            &UserId::system(),
            Utc::now(),
        );
        apply_all(&mut doc, events);

        assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Success);
        assert_eq!(doc.status(), DocumentStatus::Approved);

        let result = doc.record_integration_result(
            IntegrationKind::GoodsReceipt,
            IntegrationOutcome::Failed,
            None,
            &UserId::system(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DocumentError::IntegrationNotPending { .. })));
    }
}
