//! Audit log read model: process history across all documents.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::{HistoryAction, ProcessHistoryEntry};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, document_event};
use crate::read_model::ReadModel;

struct AuditLogState {
    entries: Vec<ProcessHistoryEntry>,
    position: ProjectionPosition,
}

/// Read model holding every history entry in the order it was recorded.
///
/// Entries are only ever appended; there is no update or delete path.
#[derive(Clone)]
pub struct AuditLogView {
    state: Arc<RwLock<AuditLogState>>,
}

impl AuditLogView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AuditLogState {
                entries: Vec::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// History of one document, oldest first.
    pub async fn for_document(&self, document_id: AggregateId) -> Vec<ProcessHistoryEntry> {
        self.select(|e| e.document_id == document_id).await
    }

    /// Everything `actor` did, oldest first.
    pub async fn by_actor(&self, actor: &UserId) -> Vec<ProcessHistoryEntry> {
        self.select(|e| &e.actor == actor).await
    }

    pub async fn by_action(&self, action: HistoryAction) -> Vec<ProcessHistoryEntry> {
        self.select(|e| e.action == action).await
    }

    /// The latest `limit` entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ProcessHistoryEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn select(&self, keep: impl Fn(&ProcessHistoryEntry) -> bool) -> Vec<ProcessHistoryEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }
}

impl Default for AuditLogView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AuditLogView {
    fn name(&self) -> &'static str {
        "AuditLogView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let entry = document_event(event)?
            .and_then(|document_event| ProcessHistoryEntry::from_event(event, &document_event));

        let mut state = self.state.write().await;
        if let Some(entry) = entry {
            state.entries.push(entry);
        }
        state.position = state.position.after(event);

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for AuditLogView {
    fn name(&self) -> &'static str {
        "AuditLogView"
    }

    async fn row_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn document_count(&self) -> usize {
        let state = self.state.read().await;
        let documents: HashSet<AggregateId> = state.entries.iter().map(|e| e.document_id).collect();
        documents.len()
    }
}
