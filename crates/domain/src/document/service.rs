//! Document service: the orchestrator behind every BA document operation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use event_store::EventStore;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult, DEFAULT_MAX_CONFLICT_RETRIES};
use crate::error::DomainError;

use super::{
    AddAttachment, AssignParties, BaDocument, CancelDocument, CreateDocument, DocumentError,
    DocumentEvent, DocumentStatus, DocumentType, NewDocument, ProcessHistoryEntry,
    RecordDecision, RecordIntegrationResult, RecordSignatures, ReopenDocument, SaveDetails,
    SubmitDocument, TransitionStatus, UpdateFields,
    history::history_from_stream,
    kpi::{self, ActionItem, KpiCounts},
    numbering,
    workflow::StepType,
};

/// Tunables of the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// How often a command is recomputed after losing a concurrent append.
    pub max_conflict_retries: u32,
    /// In-flight documents submitted longer ago than this count as overdue.
    pub overdue_after_days: i64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            overdue_after_days: 7,
        }
    }
}

/// A document with everything a detail page shows.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub document: BaDocument,
    pub history: Vec<ProcessHistoryEntry>,
    /// Handover only: the inspection it follows.
    pub linked_inspection: Option<BaDocument>,
}

/// Service for managing BA documents.
///
/// Every state-changing operation loads the document, runs one aggregate
/// command and appends its events conditioned on the version it read.
pub struct DocumentService<S: EventStore> {
    handler: CommandHandler<S, BaDocument>,
    settings: WorkflowSettings,
}

impl<S: EventStore> DocumentService<S> {
    /// Creates a new document service with default settings.
    pub fn new(store: S) -> Self {
        Self::with_settings(store, WorkflowSettings::default())
    }

    pub fn with_settings(store: S, settings: WorkflowSettings) -> Self {
        Self {
            handler: CommandHandler::new(store)
                .with_max_conflict_retries(settings.max_conflict_retries),
            settings,
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, BaDocument> {
        &self.handler
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Creates a document in DRAFT with a freshly allocated number.
    #[tracing::instrument(skip(self), fields(document_id = %cmd.document_id))]
    pub async fn create_document(
        &self,
        cmd: CreateDocument,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();

        if cmd.document_type == DocumentType::Handover
            && let Some(inspection_id) = cmd.inspection_document_id
        {
            self.ensure_inspection(inspection_id).await?;
        }

        let mut new = NewDocument {
            document_id: cmd.document_id,
            document_number: String::new(),
            document_type: cmd.document_type,
            contract_number: cmd.contract_number,
            purchase_order_number: cmd.purchase_order_number,
            vendor_id: cmd.vendor_id,
            inspection_document_id: cmd.inspection_document_id,
            notes: cmd.notes,
            remarks: cmd.remarks,
            details: cmd.details,
            parties: cmd.parties,
        };

        // Refuse bad input before a number is spent on it
        BaDocument::default().create(&new, &cmd.created_by, now)?;

        let key = numbering::sequence_key(new.document_type, now);
        let sequence = self.handler.store().next_sequence(&key).await?;
        new.document_number = numbering::format_number(&key, sequence);

        let result = self
            .handler
            .execute(new.document_id, &cmd.created_by, |doc| {
                doc.create(&new, &cmd.created_by, now)
            })
            .await?;

        metrics::counter!(
            "ba_documents_created_total",
            "document_type" => new.document_type.as_str()
        )
        .increment(1);
        tracing::info!(
            document_number = %new.document_number,
            document_type = %new.document_type,
            created_by = %cmd.created_by,
            "Document created"
        );

        Ok(result)
    }

    /// Loads a document.
    pub async fn get_document(&self, id: AggregateId) -> Result<Option<BaDocument>, DomainError> {
        self.handler.load_existing(id).await
    }

    /// Loads a document with its history and, for handovers, the linked
    /// inspection.
    #[tracing::instrument(skip(self))]
    pub async fn get_document_detail(
        &self,
        id: AggregateId,
    ) -> Result<Option<DocumentDetail>, DomainError> {
        let Some(document) = self.handler.load_existing(id).await? else {
            return Ok(None);
        };

        let history = self.history_of(&document).await?;

        let linked_inspection = match document.inspection_document_id() {
            Some(inspection_id) if document.document_type() == DocumentType::Handover => {
                self.handler.load_existing(inspection_id).await?
            }
            _ => None,
        };

        Ok(Some(DocumentDetail {
            document,
            history,
            linked_inspection,
        }))
    }

    /// The process history of a document, oldest first.
    pub async fn history(&self, id: AggregateId) -> Result<Vec<ProcessHistoryEntry>, DomainError> {
        let document = self.handler.load_existing(id).await?.ok_or_else(|| not_found(id))?;
        self.history_of(&document).await
    }

    async fn history_of(
        &self,
        document: &BaDocument,
    ) -> Result<Vec<ProcessHistoryEntry>, DomainError> {
        let Some(id) = document.id() else {
            return Ok(Vec::new());
        };

        let envelopes = self.handler.store().load_stream(id).await?;
        let mut entries = history_from_stream(&envelopes)?;
        for entry in &mut entries {
            if entry.actor_role.is_none() {
                entry.actor_role = document.role_of(&entry.actor);
            }
        }
        Ok(entries)
    }

    /// Changes header fields of a draft.
    #[tracing::instrument(skip(self))]
    pub async fn update_fields(
        &self,
        cmd: UpdateFields,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        if let Some(inspection_id) = cmd.changes.inspection_document_id {
            self.ensure_inspection(inspection_id).await?;
        }

        let now = Utc::now();
        self.handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.update_fields(&cmd.changes, &cmd.actor, now)
            })
            .await
    }

    /// Replaces the party list of a draft.
    #[tracing::instrument(skip(self))]
    pub async fn assign_parties(
        &self,
        cmd: AssignParties,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.assign_parties(&cmd.parties, &cmd.actor, now)
            })
            .await
    }

    /// Replaces the detail lines of a draft.
    #[tracing::instrument(skip(self))]
    pub async fn save_details(
        &self,
        cmd: SaveDetails,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.save_details(&cmd.details, &cmd.actor, now)
            })
            .await
    }

    /// Lists a supporting file on a document.
    #[tracing::instrument(skip(self))]
    pub async fn add_attachment(
        &self,
        cmd: AddAttachment,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.add_attachment(
                    &cmd.file_name,
                    &cmd.content_type,
                    &cmd.storage_ref,
                    &cmd.actor,
                    now,
                )
            })
            .await
    }

    /// Re-validates a draft and starts its workflow.
    #[tracing::instrument(skip(self))]
    pub async fn submit_document(
        &self,
        cmd: SubmitDocument,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.document_id, &cmd.actor, |doc| doc.submit(&cmd.actor, now))
            .await?;

        observe(&result.events);
        tracing::info!(
            document_id = %cmd.document_id,
            status = %result.aggregate.status(),
            steps = result.aggregate.steps().len(),
            "Document submitted"
        );
        Ok(result)
    }

    /// Records a Checker's review decision.
    pub async fn process_review(
        &self,
        cmd: RecordDecision,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        self.decide(StepType::Review, cmd).await
    }

    /// Records an Approver's decision.
    pub async fn process_approval(
        &self,
        cmd: RecordDecision,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        self.decide(StepType::Approve, cmd).await
    }

    #[tracing::instrument(skip(self))]
    async fn decide(
        &self,
        step_type: StepType,
        cmd: RecordDecision,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.record_decision(
                    step_type,
                    cmd.decision,
                    cmd.comment.as_deref(),
                    &cmd.actor,
                    now,
                )
            })
            .await?;

        metrics::counter!(
            "ba_decisions_total",
            "step_type" => step_type.as_str(),
            "decision" => cmd.decision.as_str()
        )
        .increment(1);
        observe(&result.events);
        tracing::info!(
            document_id = %cmd.document_id,
            actor = %cmd.actor,
            decision = cmd.decision.as_str(),
            status = %result.aggregate.status(),
            "Decision recorded"
        );
        Ok(result)
    }

    /// Cancels a document that has not entered review.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_document(
        &self,
        cmd: CancelDocument,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.cancel(&cmd.reason, &cmd.actor, now)
            })
            .await?;

        observe(&result.events);
        tracing::info!(document_id = %cmd.document_id, reason = %cmd.reason, "Document cancelled");
        Ok(result)
    }

    /// Sends a rejected document back to DRAFT.
    #[tracing::instrument(skip(self))]
    pub async fn reopen_document(
        &self,
        cmd: ReopenDocument,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.reopen(cmd.comment.as_deref(), &cmd.actor, now)
            })
            .await?;

        observe(&result.events);
        Ok(result)
    }

    /// Moves a document to a target status through submit, cancel or reopen.
    #[tracing::instrument(skip(self))]
    pub async fn transition_status(
        &self,
        cmd: TransitionStatus,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.transition(cmd.target, cmd.comment.as_deref(), &cmd.actor, now)
            })
            .await?;

        observe(&result.events);
        Ok(result)
    }

    /// Records whether all signatures have been captured.
    #[tracing::instrument(skip(self))]
    pub async fn record_signatures(
        &self,
        cmd: RecordSignatures,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(cmd.document_id, &cmd.actor, |doc| {
                doc.record_signatures(cmd.complete, &cmd.actor, now)
            })
            .await
    }

    /// Records a downstream result on an approved handover.
    #[tracing::instrument(skip(self))]
    pub async fn record_integration_result(
        &self,
        cmd: RecordIntegrationResult,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        let actor = UserId::system();
        self.handler
            .execute(cmd.document_id, &actor, |doc| {
                doc.record_integration_result(
                    cmd.kind,
                    cmd.outcome,
                    cmd.message.as_deref(),
                    &actor,
                    now,
                )
            })
            .await
    }

    /// Takes the edit lock for `actor`.
    #[tracing::instrument(skip(self))]
    pub async fn acquire_edit_lock(
        &self,
        document_id: AggregateId,
        actor: UserId,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(document_id, &actor, |doc| doc.acquire_lock(&actor, now))
            .await
    }

    /// Gives up the edit lock held by `actor`.
    #[tracing::instrument(skip(self))]
    pub async fn release_edit_lock(
        &self,
        document_id: AggregateId,
        actor: UserId,
    ) -> Result<CommandResult<BaDocument>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(document_id, &actor, |doc| doc.release_lock(&actor, now))
            .await
    }

    /// All documents, oldest first.
    pub async fn list_documents(&self) -> Result<Vec<BaDocument>, DomainError> {
        let ids = self
            .handler
            .store()
            .aggregate_ids(BaDocument::aggregate_type())
            .await?;

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.handler.load_existing(id).await? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Dashboard counts as of now.
    pub async fn kpi_counts(&self) -> Result<KpiCounts, DomainError> {
        self.kpi_counts_at(Utc::now()).await
    }

    /// Dashboard counts as of `now`.
    pub async fn kpi_counts_at(&self, now: DateTime<Utc>) -> Result<KpiCounts, DomainError> {
        let documents = self.list_documents().await?;
        Ok(KpiCounts::compute(
            &documents,
            now,
            Duration::days(self.settings.overdue_after_days),
        ))
    }

    /// Documents waiting on `user`.
    pub async fn my_action_items(&self, user: &UserId) -> Result<Vec<ActionItem>, DomainError> {
        let documents = self.list_documents().await?;
        Ok(kpi::action_items_for(&documents, user))
    }

    async fn ensure_inspection(&self, id: AggregateId) -> Result<(), DomainError> {
        match self.handler.load_existing(id).await? {
            Some(doc) if doc.document_type() == DocumentType::Inspection => Ok(()),
            _ => Err(DocumentError::LinkedInspectionInvalid { id }.into()),
        }
    }
}

fn not_found(id: AggregateId) -> DomainError {
    DomainError::AggregateNotFound {
        aggregate_type: BaDocument::aggregate_type(),
        aggregate_id: id.to_string(),
    }
}

/// Counts status transitions and logs queued integration requests.
fn observe(events: &[DocumentEvent]) {
    for event in events {
        let transition = match event {
            DocumentEvent::DocumentSubmitted(data) => Some((DocumentStatus::Draft, data.status)),
            DocumentEvent::DecisionRecorded(data) => {
                data.to_status.map(|to| (data.from_status, to))
            }
            DocumentEvent::DocumentCancelled(data) => {
                Some((data.from_status, DocumentStatus::Cancelled))
            }
            DocumentEvent::DocumentReopened(_) => {
                Some((DocumentStatus::Rejected, DocumentStatus::Draft))
            }
            _ => None,
        };

        if let Some((from, to)) = transition {
            metrics::counter!(
                "ba_status_transitions_total",
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
        }

        if let Some(outbox) = event.outbox() {
            tracing::info!(
                document_id = %outbox.goods_receipt.document_id,
                purchase_order_number = %outbox.goods_receipt.purchase_order_number,
                "Integration requests queued"
            );
        }
    }
}
