//! Document status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::workflow::StepType;

/// The status of a BA document in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft         ──► Submitted | Cancelled
/// Submitted     ──► UnderReview | UnderApproval | Cancelled
/// UnderReview   ──► UnderApproval | Approved | Rejected
/// UnderApproval ──► Approved | Rejected
/// Rejected      ──► Draft
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Being drafted; parties and detail lines may change.
    #[default]
    Draft,

    /// Handed in; steps materialized. Passed through within submission.
    Submitted,

    /// Waiting on Checker decisions.
    UnderReview,

    /// Waiting on Approver decisions.
    UnderApproval,

    /// Fully approved (terminal state).
    Approved,

    /// Rejected by a Checker or Approver; may be reopened.
    Rejected,

    /// Withdrawn before review started (terminal state).
    Cancelled,
}

const TRANSITIONS: &[(DocumentStatus, DocumentStatus)] = &[
    (DocumentStatus::Draft, DocumentStatus::Submitted),
    (DocumentStatus::Draft, DocumentStatus::Cancelled),
    (DocumentStatus::Submitted, DocumentStatus::UnderReview),
    (DocumentStatus::Submitted, DocumentStatus::UnderApproval),
    (DocumentStatus::Submitted, DocumentStatus::Cancelled),
    (DocumentStatus::UnderReview, DocumentStatus::UnderApproval),
    (DocumentStatus::UnderReview, DocumentStatus::Approved),
    (DocumentStatus::UnderReview, DocumentStatus::Rejected),
    (DocumentStatus::UnderApproval, DocumentStatus::Approved),
    (DocumentStatus::UnderApproval, DocumentStatus::Rejected),
    (DocumentStatus::Rejected, DocumentStatus::Draft),
];

impl DocumentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [DocumentStatus; 7] = [
        DocumentStatus::Draft,
        DocumentStatus::Submitted,
        DocumentStatus::UnderReview,
        DocumentStatus::UnderApproval,
        DocumentStatus::Approved,
        DocumentStatus::Rejected,
        DocumentStatus::Cancelled,
    ];

    /// Returns true if the transition table lists `self -> to`.
    pub fn can_transition_to(&self, to: DocumentStatus) -> bool {
        TRANSITIONS.contains(&(*self, to))
    }

    /// Targets reachable in one hop.
    pub fn allowed_transitions(&self) -> Vec<DocumentStatus> {
        TRANSITIONS
            .iter()
            .filter(|(from, _)| from == self)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Returns true if fields, parties and detail lines may change.
    pub fn is_editable(&self) -> bool {
        matches!(self, DocumentStatus::Draft)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Cancelled)
    }

    /// Returns true once the document no longer accepts any change.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Approved | DocumentStatus::Rejected | DocumentStatus::Cancelled
        )
    }

    /// Submitted and waiting on someone.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Submitted | DocumentStatus::UnderReview | DocumentStatus::UnderApproval
        )
    }

    /// The kind of decision this status is waiting on.
    pub fn active_step_type(&self) -> Option<StepType> {
        match self {
            DocumentStatus::UnderReview => Some(StepType::Review),
            DocumentStatus::UnderApproval => Some(StepType::Approve),
            _ => None,
        }
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Submitted => "SUBMITTED",
            DocumentStatus::UnderReview => "UNDER_REVIEW",
            DocumentStatus::UnderApproval => "UNDER_APPROVAL",
            DocumentStatus::Approved => "APPROVED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string names no known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown document status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DocumentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
