//! The projection trait and how far each read model has followed the log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Aggregate, BaDocument, DocumentEvent};
use event_store::EventEnvelope;

use crate::{ProjectionError, Result};

/// Where a read model stands in the store's global event order.
///
/// Integration job streams share the global order with document streams, so
/// a view advances past job events even though it ignores them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Events seen so far, counted in global order.
    pub events_processed: u64,
    /// How many of those came from BA document streams.
    pub document_events: u64,
    /// Commit time of the last event seen.
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// The position once `event` has been seen.
    pub fn after(&self, event: &EventEnvelope) -> Self {
        let from_document = event.aggregate_type == BaDocument::aggregate_type();
        Self {
            events_processed: self.events_processed + 1,
            document_events: self.document_events + u64::from(from_document),
            last_recorded_at: Some(event.timestamp),
        }
    }

    /// True if the event at 1-based global `index` was already applied.
    pub fn has_seen(&self, index: u64) -> bool {
        index <= self.events_processed
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} events ({} from documents)",
            self.events_processed, self.document_events
        )
    }
}

/// A read model fed from the BA event log.
///
/// `handle` receives every stored event in global order and must advance the
/// position for each one, including events it has no use for.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops every row and goes back to position zero.
    async fn reset(&self) -> Result<()>;
}

/// Decodes a document event; `None` for events of other streams.
pub(crate) fn document_event(event: &EventEnvelope) -> Result<Option<DocumentEvent>> {
    if event.aggregate_type != BaDocument::aggregate_type() {
        return Ok(None);
    }
    serde_json::from_value(event.payload.clone())
        .map(Some)
        .map_err(|source| ProjectionError::decode(event, source))
}
