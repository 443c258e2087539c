//! Integration job events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::DomainEvent;
use domain::document::IntegrationKind;
use serde::{Deserialize, Serialize};

/// Events recorded while delivering one integration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    JobQueued(JobQueuedData),
    AttemptStarted(AttemptStartedData),
    AttemptFailed(AttemptFailedData),
    JobSucceeded(JobSucceededData),
    JobAbandoned(JobAbandonedData),
}

impl DomainEvent for JobEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobQueued(_) => "JobQueued",
            JobEvent::AttemptStarted(_) => "AttemptStarted",
            JobEvent::AttemptFailed(_) => "AttemptFailed",
            JobEvent::JobSucceeded(_) => "JobSucceeded",
            JobEvent::JobAbandoned(_) => "JobAbandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueuedData {
    pub job_id: AggregateId,
    /// The approved handover the request came from.
    pub document_id: AggregateId,
    pub kind: IntegrationKind,
    pub max_retries: u32,
    pub queued_at: DateTime<Utc>,
}

/// A dispatcher claimed the job and is about to call downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStartedData {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptFailedData {
    /// 1-based number of the failed attempt.
    pub attempt: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSucceededData {
    pub attempt: u32,
    /// Reference handed back by the downstream system, if any.
    pub reference: Option<String>,
    pub succeeded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAbandonedData {
    pub attempts: u32,
    pub reason: String,
    pub abandoned_at: DateTime<Utc>,
}
