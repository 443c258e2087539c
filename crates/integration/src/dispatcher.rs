//! Outbox dispatcher delivering approved handovers downstream.

use chrono::Utc;
use common::{AggregateId, UserId};
use domain::document::{IntegrationKind, IntegrationOutbox, IntegrationOutcome};
use domain::{
    Aggregate, DocumentError, DocumentEvent, DocumentService, DomainError, DomainEvent,
    RecordIntegrationResult,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::aggregate::{DEFAULT_MAX_RETRIES, IntegrationJob};
use crate::error::{IntegrationError, Result};
use crate::events::JobEvent;
use crate::services::erp::ErpService;
use crate::services::monitoring::OrderMonitoringService;
use crate::state::JobState;

/// Outcome counts of one [`IntegrationDispatcher::drain`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs that used their last retry during this pass.
    pub abandoned: usize,
    /// Finished jobs whose result was written onto the document late.
    pub reconciled: usize,
    /// Requests skipped because of an error outside the downstream call.
    pub errors: usize,
}

/// An outbox request found in the event log.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub document_id: AggregateId,
    pub outbox: IntegrationOutbox,
}

/// Delivers the integration requests of approved handovers.
///
/// Every request becomes an event-sourced [`IntegrationJob`]. Each drain makes
/// at most one attempt per live job; once a job runs out of retries the
/// document's integration status is set to FAILED. The document's own status
/// is never touched.
///
/// An attempt is claimed in the job stream before downstream is called, so
/// dispatchers sharing a store never call twice for the same attempt. A
/// finished job whose result never reached the document is settled again on
/// the next drain.
pub struct IntegrationDispatcher<S, E, M>
where
    S: EventStore,
    E: ErpService,
    M: OrderMonitoringService,
{
    store: S,
    documents: DocumentService<S>,
    erp: E,
    monitoring: M,
    max_retries: u32,
    drain_lock: Mutex<()>,
}

impl<S, E, M> IntegrationDispatcher<S, E, M>
where
    S: EventStore + Clone,
    E: ErpService,
    M: OrderMonitoringService,
{
    pub fn new(store: S, erp: E, monitoring: M) -> Self {
        let documents = DocumentService::new(store.clone());
        Self {
            store,
            documents,
            erp,
            monitoring,
            max_retries: DEFAULT_MAX_RETRIES,
            drain_lock: Mutex::new(()),
        }
    }

    /// Sets how many failed attempts a job gets before it is abandoned.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Every outbox recorded in the event log, in store order.
    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>> {
        let mut envelopes = self.store.events_by_type("DocumentSubmitted").await?;
        envelopes.extend(self.store.events_by_type("DecisionRecorded").await?);

        let mut requests = Vec::new();
        for envelope in envelopes {
            let event: DocumentEvent = envelope.decode()?;
            if let Some(outbox) = event.outbox() {
                requests.push(PendingRequest {
                    document_id: envelope.aggregate_id,
                    outbox: outbox.clone(),
                });
            }
        }
        Ok(requests)
    }

    /// Makes one delivery attempt for every request whose job is still open.
    ///
    /// Returns an empty report without doing anything while another drain of
    /// this dispatcher is running. A request that fails outside the
    /// downstream call is logged and counted; the pass goes on.
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self) -> Result<DrainReport> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("Drain already running; pass skipped");
            return Ok(DrainReport::default());
        };
        let mut report = DrainReport::default();

        for request in self.pending_requests().await? {
            for kind in [IntegrationKind::GoodsReceipt, IntegrationKind::MonitoringSync] {
                if let Err(e) = self.deliver(&request, kind, &mut report).await {
                    report.errors += 1;
                    tracing::error!(
                        document_id = %request.document_id,
                        %kind,
                        error = %e,
                        "Integration request skipped"
                    );
                }
            }
        }

        if report != DrainReport::default() {
            tracing::info!(
                attempted = report.attempted,
                succeeded = report.succeeded,
                failed = report.failed,
                abandoned = report.abandoned,
                reconciled = report.reconciled,
                errors = report.errors,
                "Outbox drained"
            );
        }
        Ok(report)
    }

    /// Loads the job delivering `kind` for a document.
    pub async fn get_job(
        &self,
        document_id: AggregateId,
        kind: IntegrationKind,
    ) -> Result<Option<IntegrationJob>> {
        let job = self.load_job(IntegrationJob::id_for(document_id, kind)).await?;
        Ok(job.id().is_some().then_some(job))
    }

    async fn deliver(
        &self,
        request: &PendingRequest,
        kind: IntegrationKind,
        report: &mut DrainReport,
    ) -> Result<()> {
        let document_id = request.document_id;
        let job_id = IntegrationJob::id_for(document_id, kind);
        let mut job = self.load_job(job_id).await?;

        if job.state().is_terminal() {
            if self.reconcile(document_id, kind, &job).await? {
                report.reconciled += 1;
            }
            return Ok(());
        }
        if job.state() == JobState::NotQueued {
            let events = job.queue(document_id, kind, self.max_retries, Utc::now())?;
            if lost_race(self.append_job_events(&mut job, job_id, events).await)? {
                return Ok(());
            }
        }

        let now = Utc::now();
        if !job.is_claimable(now) {
            tracing::debug!(%document_id, %kind, "Job claimed by another dispatcher");
            return Ok(());
        }
        let events = job.claim(now)?;
        if lost_race(self.append_job_events(&mut job, job_id, events).await)? {
            tracing::debug!(%document_id, %kind, "Claim lost to another dispatcher");
            return Ok(());
        }

        report.attempted += 1;
        match self.call(&request.outbox, kind).await {
            Ok(reference) => {
                let events = job.record_success(reference.clone(), Utc::now())?;
                self.append_job_events(&mut job, job_id, events).await?;
                report.succeeded += 1;
                metrics::counter!(
                    "ba_integration_attempts_total",
                    "kind" => kind.as_str(),
                    "outcome" => "succeeded"
                )
                .increment(1);
                tracing::info!(%document_id, %kind, attempt = job.attempts(), "Integration delivered");

                self.settle(document_id, kind, IntegrationOutcome::Succeeded, reference)
                    .await?;
            }
            Err(e) if e.is_downstream() => {
                let message = e.to_string();
                let events = job.record_failure(&message, Utc::now())?;
                self.append_job_events(&mut job, job_id, events).await?;
                report.failed += 1;
                metrics::counter!(
                    "ba_integration_attempts_total",
                    "kind" => kind.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                tracing::warn!(
                    %document_id,
                    %kind,
                    attempt = job.attempts(),
                    max_retries = job.max_retries(),
                    error = %message,
                    "Integration attempt failed"
                );

                if job.state() == JobState::Abandoned {
                    report.abandoned += 1;
                    self.settle(document_id, kind, IntegrationOutcome::Failed, Some(message))
                        .await?;
                }
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Calls the downstream system, returning its reference on success.
    async fn call(&self, outbox: &IntegrationOutbox, kind: IntegrationKind) -> Result<Option<String>> {
        match kind {
            IntegrationKind::GoodsReceipt => {
                let result = self.erp.create_goods_receipt(&outbox.goods_receipt).await?;
                Ok(Some(result.receipt_number))
            }
            IntegrationKind::MonitoringSync => {
                self.monitoring.sync_stage(&outbox.monitoring_sync).await?;
                Ok(None)
            }
        }
    }

    /// Settles a finished job onto its document if that never happened.
    /// Returns true if a result was written.
    async fn reconcile(
        &self,
        document_id: AggregateId,
        kind: IntegrationKind,
        job: &IntegrationJob,
    ) -> Result<bool> {
        let (outcome, message) = match job.state() {
            JobState::Succeeded => (
                IntegrationOutcome::Succeeded,
                job.reference().map(String::from),
            ),
            JobState::Abandoned => (IntegrationOutcome::Failed, job.last_error().map(String::from)),
            _ => return Ok(false),
        };
        let Some(document) = self.documents.get_document(document_id).await? else {
            return Ok(false);
        };

        let settled = match kind {
            IntegrationKind::GoodsReceipt => {
                document.goods_receipt_status() == outcome.goods_receipt_status()
            }
            IntegrationKind::MonitoringSync => {
                document.monitoring_sync_status() == outcome.monitoring_sync_status()
            }
        };
        if settled {
            return Ok(false);
        }

        tracing::warn!(%document_id, %kind, outcome = outcome.as_str(), "Settling finished job late");
        self.settle(document_id, kind, outcome, message).await?;
        Ok(true)
    }

    /// Writes the final result onto the document.
    async fn settle(
        &self,
        document_id: AggregateId,
        kind: IntegrationKind,
        outcome: IntegrationOutcome,
        message: Option<String>,
    ) -> Result<()> {
        let cmd = RecordIntegrationResult {
            document_id,
            kind,
            outcome,
            message,
        };
        match self.documents.record_integration_result(cmd).await {
            Ok(_) => Ok(()),
            // Already recorded by someone else.
            Err(DomainError::Document(DocumentError::IntegrationNotPending { .. })) => {
                tracing::debug!(%document_id, %kind, "Integration result already recorded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_job(&self, job_id: AggregateId) -> Result<IntegrationJob> {
        let mut job = IntegrationJob::default();
        for envelope in self.store.load_stream(job_id).await? {
            let event: JobEvent = envelope.decode()?;
            job.apply(event);
            job.set_version(envelope.version);
        }
        Ok(job)
    }

    /// Appends job events at the job's current version and applies them.
    async fn append_job_events(
        &self,
        job: &mut IntegrationJob,
        job_id: AggregateId,
        events: Vec<JobEvent>,
    ) -> Result<Version> {
        let current_version = job.version();
        let mut version = current_version;
        let mut envelopes = Vec::with_capacity(events.len());

        for event in &events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .event_type(event.event_type())
                .aggregate_id(job_id)
                .aggregate_type(IntegrationJob::aggregate_type())
                .version(version)
                .recorded_by(UserId::system())
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(current_version))
            .await?;

        job.apply_events(events);
        job.set_version(new_version);
        Ok(new_version)
    }
}

/// `Ok(true)` if the append lost to a concurrent writer of the same job.
fn lost_race(result: Result<Version>) -> Result<bool> {
    match result {
        Ok(_) => Ok(false),
        Err(IntegrationError::EventStore(e)) if e.is_conflict() => Ok(true),
        Err(e) => Err(e),
    }
}
