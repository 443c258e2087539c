//! Document board read model: one row per BA document for list screens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::document::{GoodsReceiptStatus, IntegrationKind, MonitoringSyncStatus};
use domain::{DocumentEvent, DocumentStatus, DocumentType};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, document_event};
use crate::read_model::ReadModel;

/// One row of the document board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: AggregateId,
    pub document_number: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub revision: u32,
    pub purchase_order_number: String,
    pub vendor_id: String,
    pub contract_number: Option<String>,
    /// Steps of the current round still waiting for a decision.
    pub pending_steps: usize,
    pub total_steps: usize,
    pub goods_receipt_status: GoodsReceiptStatus,
    pub monitoring_sync_status: MonitoringSyncStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentSummary {
    /// True when a downstream system still has to confirm the handover.
    pub fn awaits_integration(&self) -> bool {
        matches!(
            self.goods_receipt_status,
            GoodsReceiptStatus::Pending | GoodsReceiptStatus::Failed
        ) || matches!(
            self.monitoring_sync_status,
            MonitoringSyncStatus::Pending | MonitoringSyncStatus::Failed
        )
    }
}

/// Read model listing every document with its current status.
///
/// Rows are never removed: cancelled and approved documents stay on the
/// board with their final status.
#[derive(Clone)]
pub struct DocumentBoardView {
    documents: Arc<RwLock<HashMap<AggregateId, DocumentSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl DocumentBoardView {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    pub async fn get(&self, document_id: AggregateId) -> Option<DocumentSummary> {
        self.documents.read().await.get(&document_id).cloned()
    }

    /// All rows ordered by document number.
    pub async fn all(&self) -> Vec<DocumentSummary> {
        let mut rows: Vec<_> = self.documents.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.document_number.cmp(&b.document_number));
        rows
    }

    pub async fn by_status(&self, status: DocumentStatus) -> Vec<DocumentSummary> {
        self.filtered(|row| row.status == status).await
    }

    pub async fn by_vendor(&self, vendor_id: &str) -> Vec<DocumentSummary> {
        self.filtered(|row| row.vendor_id == vendor_id).await
    }

    /// Approved handovers whose integrations have not succeeded yet.
    pub async fn awaiting_integration(&self) -> Vec<DocumentSummary> {
        self.filtered(DocumentSummary::awaits_integration).await
    }

    async fn filtered(&self, keep: impl Fn(&DocumentSummary) -> bool) -> Vec<DocumentSummary> {
        let mut rows: Vec<_> = self
            .documents
            .read()
            .await
            .values()
            .filter(|row| keep(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.document_number.cmp(&b.document_number));
        rows
    }
}

impl Default for DocumentBoardView {
    fn default() -> Self {
        Self::new()
    }
}

fn mark_pending(row: &mut DocumentSummary) {
    row.goods_receipt_status = GoodsReceiptStatus::Pending;
    row.monitoring_sync_status = MonitoringSyncStatus::Pending;
}

#[async_trait]
impl Projection for DocumentBoardView {
    fn name(&self) -> &'static str {
        "DocumentBoardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if let Some(document_event) = document_event(event)? {
            let document_id = event.aggregate_id;
            let mut documents = self.documents.write().await;

            if let DocumentEvent::DocumentCreated(data) = &document_event {
                documents.insert(
                    document_id,
                    DocumentSummary {
                        document_id,
                        document_number: data.document_number.clone(),
                        document_type: data.document_type,
                        status: DocumentStatus::Draft,
                        revision: 1,
                        purchase_order_number: data.purchase_order_number.clone(),
                        vendor_id: data.vendor_id.clone(),
                        contract_number: data.contract_number.clone(),
                        pending_steps: 0,
                        total_steps: 0,
                        goods_receipt_status: GoodsReceiptStatus::NotApplicable,
                        monitoring_sync_status: MonitoringSyncStatus::NotApplicable,
                        created_by: data.created_by.clone(),
                        created_at: data.created_at,
                        updated_at: data.created_at,
                    },
                );
            } else if let Some(row) = documents.get_mut(&document_id) {
                match document_event {
                    DocumentEvent::DraftSaved(data) => {
                        let changes = data.changes;
                        if let Some(po) = changes.purchase_order_number {
                            row.purchase_order_number = po;
                        }
                        if let Some(vendor_id) = changes.vendor_id {
                            row.vendor_id = vendor_id;
                        }
                        if changes.contract_number.is_some() {
                            row.contract_number = changes.contract_number;
                        }
                    }
                    DocumentEvent::DocumentSubmitted(data) => {
                        row.status = data.status;
                        row.total_steps = data.steps.len();
                        row.pending_steps = data.steps.iter().filter(|s| s.is_pending()).count();
                        if data.outbox.is_some() {
                            mark_pending(row);
                        }
                    }
                    DocumentEvent::DecisionRecorded(data) => {
                        row.pending_steps = row.pending_steps.saturating_sub(1);
                        if let Some(to) = data.to_status {
                            row.status = to;
                        }
                        if data.outbox.is_some() {
                            mark_pending(row);
                        }
                    }
                    DocumentEvent::DocumentCancelled(_) => {
                        row.status = DocumentStatus::Cancelled;
                    }
                    DocumentEvent::DocumentReopened(data) => {
                        row.status = DocumentStatus::Draft;
                        row.revision = data.revision;
                        row.pending_steps = 0;
                        row.total_steps = 0;
                    }
                    DocumentEvent::IntegrationResultRecorded(data) => match data.kind {
                        IntegrationKind::GoodsReceipt => {
                            row.goods_receipt_status = data.outcome.goods_receipt_status();
                        }
                        IntegrationKind::MonitoringSync => {
                            row.monitoring_sync_status = data.outcome.monitoring_sync_status();
                        }
                    },
                    _ => {}
                }
                row.updated_at = event.timestamp;
            } else {
                tracing::warn!(%document_id, event_type = %event.event_type, "Event for unknown document");
            }
        }

        let mut pos = self.position.write().await;
        *pos = pos.after(event);

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.documents.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for DocumentBoardView {
    fn name(&self) -> &'static str {
        "DocumentBoardView"
    }

    async fn row_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// One row per document.
    async fn document_count(&self) -> usize {
        self.row_count().await
    }
}
