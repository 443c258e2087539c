//! Delivery state of an integration job.

use serde::{Deserialize, Serialize};

/// The state of one integration job.
///
/// ```text
/// NotQueued ──► Queued ──► InFlight ──┬──► Succeeded
///                 ▲           │       │
///                 └───────────┘       └──► Abandoned   (after max_retries failed attempts)
///                failed attempt
/// ```
///
/// An `InFlight` job whose claim has gone stale may be claimed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    NotQueued,
    /// Waiting for its next delivery attempt.
    Queued,
    /// Claimed by a dispatcher that is calling downstream.
    InFlight,
    Succeeded,
    /// Gave up after too many failed attempts.
    Abandoned,
}

impl JobState {
    /// Returns true if another delivery attempt may be made.
    pub fn can_attempt(&self) -> bool {
        matches!(self, JobState::Queued)
    }

    /// Returns true if an attempt is under way and awaits its outcome.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::InFlight)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotQueued => "NOT_QUEUED",
            JobState::Queued => "QUEUED",
            JobState::InFlight => "IN_FLIGHT",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Abandoned => "ABANDONED",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
