//! Errors raised while feeding the read models.

use common::AggregateId;
use event_store::{EventEnvelope, EventStoreError, Version};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A stored document event no longer matches its schema.
    #[error("Cannot decode {event_type} of document {document_id} at version {version}: {source}")]
    Decode {
        document_id: AggregateId,
        event_type: String,
        version: Version,
        #[source]
        source: serde_json::Error,
    },
}

impl ProjectionError {
    pub(crate) fn decode(event: &EventEnvelope, source: serde_json::Error) -> Self {
        ProjectionError::Decode {
            document_id: event.aggregate_id,
            event_type: event.event_type.clone(),
            version: event.version,
            source,
        }
    }

    /// The document whose events could not be projected, if any.
    pub fn document_id(&self) -> Option<AggregateId> {
        match self {
            ProjectionError::Decode { document_id, .. } => Some(*document_id),
            ProjectionError::EventStore(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
