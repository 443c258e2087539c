//! BA document endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{AggregateId, UserId};
use domain::{
    ActionItem, AddAttachment, AssignParties, BaDocument, CancelDocument, CommandResult,
    CreateDocument, Decision, DetailLines, DocumentDetail, DocumentService, DocumentStatus,
    DocumentType, DomainEvent, FieldChanges, KpiCounts, PartyProfile, ProcessHistoryEntry,
    RecordDecision, RecordSignatures, ReopenDocument, SaveDetails, SubmitDocument,
    TransitionStatus, UpdateFields,
};
use event_store::EventStore;
use integration::{InMemoryErpService, InMemoryOrderMonitoringService, IntegrationDispatcher};
use projections::{AuditLogView, DocumentBoardView, DocumentSummary, ProjectionProcessor};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// The dispatcher wired to the in-process downstream services.
pub type Dispatcher<S> =
    IntegrationDispatcher<S, InMemoryErpService, InMemoryOrderMonitoringService>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub documents: DocumentService<S>,
    pub dispatcher: Dispatcher<S>,
    pub board: Arc<DocumentBoardView>,
    pub audit_log: Arc<AuditLogView>,
    pub event_store: S,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub document_type: DocumentType,
    pub purchase_order_number: String,
    pub vendor_id: String,
    pub contract_number: Option<String>,
    pub inspection_document_id: Option<String>,
    pub notes: Option<String>,
    pub remarks: Option<String>,
    pub details: Option<DetailLines>,
    #[serde(default)]
    pub parties: Vec<PartyProfile>,
    pub created_by: UserId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldsRequest {
    pub changes: FieldChanges,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AssignPartiesRequest {
    pub parties: Vec<PartyProfile>,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SaveDetailsRequest {
    pub details: DetailLines,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    pub file_name: String,
    pub content_type: String,
    pub storage_ref: String,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    pub comment: Option<String>,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ReopenRequest {
    pub comment: Option<String>,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub target: DocumentStatus,
    pub comment: Option<String>,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SignaturesRequest {
    pub complete: bool,
    pub actor: UserId,
}

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub status: Option<DocumentStatus>,
    pub vendor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionItemsQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct DocumentCreatedResponse {
    pub document_id: String,
    pub document_number: String,
    pub status: DocumentStatus,
}

/// A document after a command, with the events the command recorded.
#[derive(Serialize)]
pub struct CommandResponse {
    pub document: BaDocument,
    pub version: i64,
    pub events: Vec<&'static str>,
}

impl From<CommandResult<BaDocument>> for CommandResponse {
    fn from(result: CommandResult<BaDocument>) -> Self {
        Self {
            events: result.events.iter().map(|e| e.event_type()).collect(),
            version: result.new_version.as_i64(),
            document: result.aggregate,
        }
    }
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub recorded_by: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /documents — create a draft, optionally with parties and details.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentCreatedResponse>), ApiError> {
    let mut cmd = CreateDocument::new(
        req.document_type,
        req.purchase_order_number,
        req.vendor_id,
        req.created_by,
    )
    .with_parties(req.parties);
    cmd.contract_number = req.contract_number;
    cmd.notes = req.notes;
    cmd.remarks = req.remarks;
    cmd.details = req.details;
    if let Some(ref inspection) = req.inspection_document_id {
        cmd = cmd.linked_to(parse_aggregate_id(inspection)?);
    }

    let document_id = cmd.document_id;
    let result = state.documents.create_document(cmd).await?;

    let response = DocumentCreatedResponse {
        document_id: document_id.to_string(),
        document_number: result.aggregate.document_number().to_string(),
        status: result.aggregate.status(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /documents — the document board, optionally filtered.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    // Run catch-up to ensure the read model includes latest events
    state.projection_processor.run_catch_up().await?;

    let rows: Vec<DocumentSummary> = match (query.status, query.vendor.as_deref()) {
        (Some(status), vendor) => state
            .board
            .by_status(status)
            .await
            .into_iter()
            .filter(|row| vendor.is_none_or(|v| row.vendor_id == v))
            .collect(),
        (None, Some(vendor)) => state.board.by_vendor(vendor).await,
        (None, None) => state.board.all().await,
    };

    Ok(Json(rows))
}

/// GET /documents/kpi — dashboard counts.
#[tracing::instrument(skip(state))]
pub async fn kpi<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<KpiCounts>, ApiError> {
    Ok(Json(state.documents.kpi_counts().await?))
}

/// GET /documents/action-items?user= — documents waiting on a user.
#[tracing::instrument(skip(state))]
pub async fn action_items<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ActionItemsQuery>,
) -> Result<Json<Vec<ActionItem>>, ApiError> {
    if query.user.trim().is_empty() {
        return Err(ApiError::BadRequest("user is required".to_string()));
    }
    let user = UserId::new(query.user);
    Ok(Json(state.documents.my_action_items(&user).await?))
}

/// GET /documents/{id} — the document with its history and linked inspection.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, ApiError> {
    let document_id = parse_aggregate_id(&id)?;
    let detail = state
        .documents
        .get_document_detail(document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;

    Ok(Json(detail))
}

/// PATCH /documents/{id} — change header fields of a draft.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFieldsRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = UpdateFields::new(parse_aggregate_id(&id)?, req.changes, req.actor);
    Ok(Json(state.documents.update_fields(cmd).await?.into()))
}

/// PUT /documents/{id}/parties — replace the parties of a draft.
#[tracing::instrument(skip(state, req))]
pub async fn assign_parties<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AssignPartiesRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = AssignParties::new(parse_aggregate_id(&id)?, req.parties, req.actor);
    Ok(Json(state.documents.assign_parties(cmd).await?.into()))
}

/// PUT /documents/{id}/details — replace the detail lines of a draft.
#[tracing::instrument(skip(state, req))]
pub async fn save_details<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SaveDetailsRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = SaveDetails::new(parse_aggregate_id(&id)?, req.details, req.actor);
    Ok(Json(state.documents.save_details(cmd).await?.into()))
}

/// POST /documents/{id}/attachments — list a supporting file.
#[tracing::instrument(skip(state, req))]
pub async fn add_attachment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AttachmentRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = AddAttachment {
        document_id: parse_aggregate_id(&id)?,
        file_name: req.file_name,
        content_type: req.content_type,
        storage_ref: req.storage_ref,
        actor: req.actor,
    };
    Ok(Json(state.documents.add_attachment(cmd).await?.into()))
}

/// POST /documents/{id}/submit — validate and start the workflow.
#[tracing::instrument(skip(state, req))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = SubmitDocument::new(parse_aggregate_id(&id)?, req.actor);
    Ok(Json(state.documents.submit_document(cmd).await?.into()))
}

/// POST /documents/{id}/review — record a checker's decision.
#[tracing::instrument(skip(state, req))]
pub async fn review<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = decision_command(&id, req)?;
    Ok(Json(state.documents.process_review(cmd).await?.into()))
}

/// POST /documents/{id}/approval — record an approver's decision.
#[tracing::instrument(skip(state, req))]
pub async fn approval<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = decision_command(&id, req)?;
    Ok(Json(state.documents.process_approval(cmd).await?.into()))
}

/// POST /documents/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = CancelDocument::new(parse_aggregate_id(&id)?, req.reason, req.actor);
    Ok(Json(state.documents.cancel_document(cmd).await?.into()))
}

/// POST /documents/{id}/reopen — start a new revision of a rejected document.
#[tracing::instrument(skip(state, req))]
pub async fn reopen<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ReopenRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut cmd = ReopenDocument::new(parse_aggregate_id(&id)?, req.actor);
    cmd.comment = req.comment;
    Ok(Json(state.documents.reopen_document(cmd).await?.into()))
}

/// POST /documents/{id}/transition — move to a target status directly.
#[tracing::instrument(skip(state, req))]
pub async fn transition<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let mut cmd = TransitionStatus::new(parse_aggregate_id(&id)?, req.target, req.actor);
    cmd.comment = req.comment;
    Ok(Json(state.documents.transition_status(cmd).await?.into()))
}

/// POST /documents/{id}/signatures — record whether all signatures are in.
#[tracing::instrument(skip(state, req))]
pub async fn signatures<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SignaturesRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let cmd = RecordSignatures {
        document_id: parse_aggregate_id(&id)?,
        complete: req.complete,
        actor: req.actor,
    };
    Ok(Json(state.documents.record_signatures(cmd).await?.into()))
}

/// POST /documents/{id}/lock — take the edit lock.
#[tracing::instrument(skip(state, req))]
pub async fn lock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let document_id = parse_aggregate_id(&id)?;
    Ok(Json(
        state
            .documents
            .acquire_edit_lock(document_id, req.actor)
            .await?
            .into(),
    ))
}

/// DELETE /documents/{id}/lock — release the edit lock.
#[tracing::instrument(skip(state, req))]
pub async fn unlock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let document_id = parse_aggregate_id(&id)?;
    Ok(Json(
        state
            .documents
            .release_edit_lock(document_id, req.actor)
            .await?
            .into(),
    ))
}

/// GET /documents/{id}/history — process history, oldest first.
#[tracing::instrument(skip(state))]
pub async fn history<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProcessHistoryEntry>>, ApiError> {
    let document_id = parse_aggregate_id(&id)?;
    Ok(Json(state.documents.history(document_id).await?))
}

/// GET /documents/{id}/events — raw events of a document stream.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let document_id = parse_aggregate_id(&id)?;

    let envelopes = state
        .event_store
        .load_stream(document_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Document {id} not found")));
    }

    let responses: Vec<EventEnvelopeResponse> = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            recorded_by: e.recorded_by.to_string(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

/// GET /audit — history entries across documents, newest first.
#[tracing::instrument(skip(state))]
pub async fn audit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<ProcessHistoryEntry>>, ApiError> {
    state.projection_processor.run_catch_up().await?;

    let limit = query.limit.unwrap_or(50);
    let entries = match query.actor {
        Some(actor) => {
            let mut entries = state.audit_log.by_actor(&UserId::new(actor)).await;
            entries.reverse();
            entries.truncate(limit);
            entries
        }
        None => state.audit_log.recent(limit).await,
    };

    Ok(Json(entries))
}

/// POST /integrations/drain — deliver pending outbox requests once.
#[tracing::instrument(skip(state))]
pub async fn drain<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<integration::DrainReport>, ApiError> {
    Ok(Json(state.dispatcher.drain().await?))
}

fn decision_command(id: &str, req: DecisionRequest) -> Result<RecordDecision, ApiError> {
    Ok(RecordDecision {
        document_id: parse_aggregate_id(id)?,
        decision: req.decision,
        comment: req.comment,
        actor: req.actor,
    })
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}
