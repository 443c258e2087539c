//! Integration job aggregate.

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use domain::Aggregate;
use domain::document::IntegrationKind;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IntegrationError;
use crate::events::{
    AttemptFailedData, AttemptStartedData, JobAbandonedData, JobEvent, JobQueuedData,
    JobSucceededData,
};
use crate::state::JobState;

/// Default number of failed attempts before a job is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How long a claim holds before another dispatcher may take the job over.
pub const CLAIM_TIMEOUT_SECS: i64 = 300;

/// An event-sourced delivery of one integration request.
///
/// There is exactly one job per (document, kind): its id is derived from the
/// document id, so the outbox can be drained any number of times.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationJob {
    id: Option<AggregateId>,
    version: Version,
    document_id: Option<AggregateId>,
    kind: Option<IntegrationKind>,
    state: JobState,
    attempts: u32,
    max_retries: u32,
    claimed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    reference: Option<String>,
}

impl Aggregate for IntegrationJob {
    type Event = JobEvent;
    type Error = IntegrationError;

    fn aggregate_type() -> &'static str {
        "IntegrationJob"
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
            JobEvent::JobQueued(data) => {
                self.id = Some(data.job_id);
                self.document_id = Some(data.document_id);
                self.kind = Some(data.kind);
                self.max_retries = data.max_retries;
                self.state = JobState::Queued;
            }
            JobEvent::AttemptStarted(data) => {
                self.claimed_at = Some(data.started_at);
                self.state = JobState::InFlight;
            }
            JobEvent::AttemptFailed(data) => {
                self.attempts = data.attempt;
                self.last_error = Some(data.error);
                self.claimed_at = None;
                self.state = JobState::Queued;
            }
            JobEvent::JobSucceeded(data) => {
                self.attempts = data.attempt;
                self.reference = data.reference;
                self.claimed_at = None;
                self.state = JobState::Succeeded;
            }
            JobEvent::JobAbandoned(_) => {
                self.state = JobState::Abandoned;
            }
        }
    }
}

impl IntegrationJob {
    /// The job id for a document's request of `kind`.
    pub fn id_for(document_id: AggregateId, kind: IntegrationKind) -> AggregateId {
        AggregateId::from_uuid(Uuid::new_v5(
            &document_id.as_uuid(),
            kind.as_str().as_bytes(),
        ))
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn document_id(&self) -> Option<AggregateId> {
        self.document_id
    }

    pub fn kind(&self) -> Option<IntegrationKind> {
        self.kind
    }

    /// Number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// When the running attempt was claimed.
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    /// True if a dispatcher may claim the job at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Queued => true,
            JobState::InFlight => self
                .claimed_at
                .is_none_or(|at| now - at >= Duration::seconds(CLAIM_TIMEOUT_SECS)),
            _ => false,
        }
    }
}

// Command methods (return events)
impl IntegrationJob {
    pub fn queue(
        &self,
        document_id: AggregateId,
        kind: IntegrationKind,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobEvent>, IntegrationError> {
        if self.id.is_some() {
            return Err(IntegrationError::AlreadyQueued);
        }

        Ok(vec![JobEvent::JobQueued(JobQueuedData {
            job_id: Self::id_for(document_id, kind),
            document_id,
            kind,
            max_retries: max_retries.max(1),
            queued_at: now,
        })])
    }

    /// Claims the next attempt. Must be stored before downstream is called.
    ///
    /// A stale claim is taken over under the same attempt number.
    pub fn claim(&self, now: DateTime<Utc>) -> Result<Vec<JobEvent>, IntegrationError> {
        if !self.is_claimable(now) {
            return Err(IntegrationError::InvalidState {
                expected: JobState::Queued.to_string(),
                actual: self.state,
            });
        }

        Ok(vec![JobEvent::AttemptStarted(AttemptStartedData {
            attempt: self.attempts + 1,
            started_at: now,
        })])
    }

    /// Records a failed attempt, abandoning the job once the retries are used up.
    pub fn record_failure(
        &self,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobEvent>, IntegrationError> {
        self.ensure_in_flight()?;

        let attempt = self.attempts + 1;
        let mut events = vec![JobEvent::AttemptFailed(AttemptFailedData {
            attempt,
            error: error.to_string(),
            failed_at: now,
        })];

        if attempt >= self.max_retries {
            events.push(JobEvent::JobAbandoned(JobAbandonedData {
                attempts: attempt,
                reason: error.to_string(),
                abandoned_at: now,
            }));
        }

        Ok(events)
    }

    pub fn record_success(
        &self,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobEvent>, IntegrationError> {
        self.ensure_in_flight()?;

        Ok(vec![JobEvent::JobSucceeded(JobSucceededData {
            attempt: self.attempts + 1,
            reference,
            succeeded_at: now,
        })])
    }

    fn ensure_in_flight(&self) -> Result<(), IntegrationError> {
        if self.state.is_in_flight() {
            Ok(())
        } else {
            Err(IntegrationError::InvalidState {
                expected: JobState::InFlight.to_string(),
                actual: self.state,
            })
        }
    }
}
