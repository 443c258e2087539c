//! Process history derived from the document's event stream.
//!
//! Every state-changing event maps to exactly one entry. Entries are never
//! stored separately: the stream is append-only, so the history is too.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use event_store::{EventEnvelope, EventId, EventStoreError, Version};
use serde::{Deserialize, Serialize};

use super::{DocumentEvent, DocumentStatus, RoleType, workflow::StepType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    DraftSaved,
    PartiesAssigned,
    DetailsSaved,
    AttachmentAdded,
    Submitted,
    Reviewed,
    ApprovalRecorded,
    Approved,
    Rejected,
    Cancelled,
    Reopened,
    SignatureAdded,
    IntegrationUpdated,
}

/// One line of a document's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHistoryEntry {
    /// Id of the originating event.
    pub id: EventId,
    pub document_id: AggregateId,
    /// Stream version of the originating event.
    pub version: Version,
    pub action: HistoryAction,
    pub actor: UserId,
    pub actor_role: Option<RoleType>,
    pub previous_status: Option<DocumentStatus>,
    pub new_status: Option<DocumentStatus>,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessHistoryEntry {
    /// Maps a stored event to its history entry; lock bookkeeping has none.
    pub fn from_event(envelope: &EventEnvelope, event: &DocumentEvent) -> Option<Self> {
        let mut actor_role = None;
        let mut status_change = None;

        let (action, comment) = match event {
            DocumentEvent::DocumentCreated(data) => {
                status_change = Some((None, DocumentStatus::Draft));
                (
                    HistoryAction::Created,
                    Some(format!("{} created", data.document_number)),
                )
            }
            DocumentEvent::DraftSaved(data) => (
                HistoryAction::DraftSaved,
                Some(format!("changed {}", data.changes.changed_fields().join(", "))),
            ),
            DocumentEvent::PartiesAssigned(data) => (
                HistoryAction::PartiesAssigned,
                Some(with_warnings(
                    format!("{} parties assigned", data.parties.len()),
                    data.warnings.len(),
                )),
            ),
            DocumentEvent::DetailsSaved(data) => (
                HistoryAction::DetailsSaved,
                Some(with_warnings(
                    format!("{} detail lines saved", data.details.len()),
                    data.warnings.len(),
                )),
            ),
            DocumentEvent::AttachmentAdded(data) => (
                HistoryAction::AttachmentAdded,
                Some(data.attachment.file_name.clone()),
            ),
            DocumentEvent::DocumentSubmitted(data) => {
                status_change = Some((Some(DocumentStatus::Draft), data.status));
                (
                    HistoryAction::Submitted,
                    (!data.warnings.is_empty())
                        .then(|| with_warnings("submitted".to_string(), data.warnings.len())),
                )
            }
            DocumentEvent::DecisionRecorded(data) => {
                actor_role = Some(data.role);
                if let Some(to) = data.to_status {
                    status_change = Some((Some(data.from_status), to));
                }
                let action = match (data.to_status, data.step_type) {
                    (Some(DocumentStatus::Approved), _) => HistoryAction::Approved,
                    (Some(DocumentStatus::Rejected), _) => HistoryAction::Rejected,
                    (_, StepType::Review) => HistoryAction::Reviewed,
                    (_, StepType::Approve) => HistoryAction::ApprovalRecorded,
                };
                (action, data.comment.clone())
            }
            DocumentEvent::DocumentCancelled(data) => {
                status_change = Some((Some(data.from_status), DocumentStatus::Cancelled));
                (HistoryAction::Cancelled, Some(data.reason.clone()))
            }
            DocumentEvent::DocumentReopened(data) => {
                status_change = Some((Some(DocumentStatus::Rejected), DocumentStatus::Draft));
                (
                    HistoryAction::Reopened,
                    Some(match &data.comment {
                        Some(comment) => format!("revision {}: {comment}", data.revision),
                        None => format!("revision {}", data.revision),
                    }),
                )
            }
            DocumentEvent::SignaturesRecorded(data) => (
                HistoryAction::SignatureAdded,
                Some(if data.complete {
                    "signatures complete".to_string()
                } else {
                    "signatures incomplete".to_string()
                }),
            ),
            DocumentEvent::IntegrationResultRecorded(data) => {
                let mut comment = format!("{} {}", data.kind, data.outcome.as_str());
                if let Some(message) = &data.message {
                    comment.push_str(": ");
                    comment.push_str(message);
                }
                (HistoryAction::IntegrationUpdated, Some(comment))
            }
            DocumentEvent::EditLockAcquired(_) | DocumentEvent::EditLockReleased(_) => {
                return None;
            }
        };

        let (previous_status, new_status) = match status_change {
            Some((previous, new)) => (previous, Some(new)),
            None => (None, None),
        };

        Some(Self {
            id: envelope.event_id,
            document_id: envelope.aggregate_id,
            version: envelope.version,
            action,
            actor: envelope.recorded_by.clone(),
            actor_role,
            previous_status,
            new_status,
            comment,
            timestamp: envelope.timestamp,
        })
    }

    /// Decodes a stored event and maps it.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Option<Self>, EventStoreError> {
        let event: DocumentEvent = envelope.decode()?;
        Ok(Self::from_event(envelope, &event))
    }
}

fn with_warnings(text: String, warnings: usize) -> String {
    match warnings {
        0 => text,
        1 => format!("{text} (1 warning)"),
        n => format!("{text} ({n} warnings)"),
    }
}

/// Builds the history of one document from its stream, oldest first.
pub fn history_from_stream(
    envelopes: &[EventEnvelope],
) -> Result<Vec<ProcessHistoryEntry>, EventStoreError> {
    let mut entries = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        if let Some(entry) = ProcessHistoryEntry::from_envelope(envelope)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}
