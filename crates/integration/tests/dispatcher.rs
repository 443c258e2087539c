//! Integration tests for outbox delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{AggregateId, UserId};
use domain::document::outbox::{STAGE_DELIVERED, STAGE_HANDED_OVER};
use domain::document::{
    GoodsReceiptRequest, GoodsReceiptStatus, HandoverDetail, InspectionDetail, IntegrationKind, ItemCondition,
    MonitoringSyncStatus, QualityResult,
};
use domain::{
    CreateDocument, DetailLines, DocumentService, DocumentStatus, DocumentType, PartyProfile,
    RecordDecision, RoleType, SubmitDocument,
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStream, InMemoryEventStore,
    Version,
};
use integration::{
    DrainReport, ErpService, GoodsReceiptResult, InMemoryErpService,
    InMemoryOrderMonitoringService, IntegrationDispatcher, IntegrationError, JobState,
};
use rust_decimal::Decimal;

/// ERP that takes a while to answer, so concurrent drains overlap.
#[derive(Clone, Default)]
struct SlowErp {
    inner: InMemoryErpService,
}

#[async_trait]
impl ErpService for SlowErp {
    async fn create_goods_receipt(
        &self,
        request: &GoodsReceiptRequest,
    ) -> Result<GoodsReceiptResult, IntegrationError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.create_goods_receipt(request).await
    }
}

/// Store that rejects the first write of an integration result onto a document.
#[derive(Clone, Default)]
struct ResultRejectingStore {
    inner: InMemoryEventStore,
    rejected: Arc<AtomicBool>,
}

#[async_trait]
impl EventStore for ResultRejectingStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        let writes_result = events
            .iter()
            .any(|e| e.event_type == "IntegrationResultRecorded");
        if writes_result && !self.rejected.swap(true, Ordering::SeqCst) {
            return Err(EventStoreError::InvalidAppend("store unavailable".to_string()));
        }
        self.inner.append(events, options).await
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.load_stream(aggregate_id).await
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> event_store::Result<Option<Version>> {
        self.inner.stream_version(aggregate_id).await
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> event_store::Result<Vec<AggregateId>> {
        self.inner.aggregate_ids(aggregate_type).await
    }

    async fn events_by_type(&self, event_type: &str) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.events_by_type(event_type).await
    }

    async fn stream_all_events(&self) -> event_store::Result<EventStream> {
        self.inner.stream_all_events().await
    }

    async fn next_sequence(&self, key: &str) -> event_store::Result<u64> {
        self.inner.next_sequence(key).await
    }
}

struct TestHarness<S: EventStore = InMemoryEventStore, E: ErpService = InMemoryErpService> {
    store: S,
    dispatcher: IntegrationDispatcher<S, E, InMemoryOrderMonitoringService>,
    documents: DocumentService<S>,
    erp: E,
    monitoring: InMemoryOrderMonitoringService,
}

impl TestHarness {
    fn new(max_retries: u32) -> Self {
        TestHarness::with(InMemoryEventStore::new(), InMemoryErpService::new(), max_retries)
    }
}

impl<S: EventStore + Clone, E: ErpService + Clone> TestHarness<S, E> {
    fn with(store: S, erp: E, max_retries: u32) -> Self {
        let monitoring = InMemoryOrderMonitoringService::new();

        let dispatcher = IntegrationDispatcher::new(store.clone(), erp.clone(), monitoring.clone())
            .with_max_retries(max_retries);
        let documents = DocumentService::new(store.clone());

        Self {
            store,
            dispatcher,
            documents,
            erp,
            monitoring,
        }
    }

    /// A second dispatcher over the same store and downstream systems.
    fn second_dispatcher(&self) -> IntegrationDispatcher<S, E, InMemoryOrderMonitoringService> {
        IntegrationDispatcher::new(self.store.clone(), self.erp.clone(), self.monitoring.clone())
    }

    /// Creates and submits a makers-only handover, which is approved on submit.
    async fn approved_handover(&self, po: &str) -> AggregateId {
        let lines = DetailLines::Handover(vec![HandoverDetail {
            material_code: Some("MAT-210".to_string()),
            material_description: "kWh meter 1 phase".to_string(),
            unit_of_measure: "PCS".to_string(),
            ordered_quantity: Decimal::from(200),
            already_handed_over_quantity: Decimal::ZERO,
            this_handover_quantity: Decimal::from(200),
            remaining_quantity: Decimal::ZERO,
            handover_date: NaiveDate::from_ymd_opt(2026, 10, 14),
            delivery_location: "Gudang Gandul".to_string(),
            verified_by_both_parties: true,
            condition: ItemCondition::Good,
            notes: None,
        }]);
        let cmd = CreateDocument::new(DocumentType::Handover, po, "V-310", UserId::new("v.maker"))
            .with_parties(vec![
                PartyProfile::new(RoleType::MakerVendor, "v.maker", "Vera"),
                PartyProfile::new(RoleType::MakerPln, "p.maker", "Dewi"),
            ])
            .with_details(lines);
        let id = cmd.document_id;
        self.documents.create_document(cmd).await.unwrap();

        let status = self
            .documents
            .submit_document(SubmitDocument::new(id, UserId::new("v.maker")))
            .await
            .unwrap()
            .aggregate
            .status();
        assert_eq!(status, DocumentStatus::Approved);
        id
    }
}

#[tokio::test]
async fn approved_handover_is_delivered_to_both_systems() {
    let harness = TestHarness::new(3);
    let id = harness.approved_handover("PO-4500100").await;

    let report = harness.dispatcher.drain().await.unwrap();

    assert_eq!(
        report,
        DrainReport {
            attempted: 2,
            succeeded: 2,
            failed: 0,
            abandoned: 0,
            reconciled: 0,
            errors: 0,
        }
    );
    assert_eq!(harness.erp.posted_orders(), vec!["PO-4500100"]);
    assert_eq!(
        harness.monitoring.stage_of("PO-4500100").as_deref(),
        Some(STAGE_HANDED_OVER)
    );
    assert_eq!(harness.monitoring.transitions()[0].1, STAGE_DELIVERED);

    let doc = harness.documents.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status(), DocumentStatus::Approved);
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Success);
    assert_eq!(doc.monitoring_sync_status(), MonitoringSyncStatus::Synced);

    let job = harness
        .dispatcher
        .get_job(id, IntegrationKind::GoodsReceipt)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.state(), JobState::Succeeded);
    assert_eq!(job.attempts(), 1);
    assert_eq!(job.reference(), Some("GR-0000001"));
}

#[tokio::test]
async fn draining_twice_delivers_once() {
    let harness = TestHarness::new(3);
    harness.approved_handover("PO-4500101").await;

    harness.dispatcher.drain().await.unwrap();
    let second = harness.dispatcher.drain().await.unwrap();

    assert_eq!(second, DrainReport::default());
    assert_eq!(harness.erp.receipt_count(), 1);
    assert_eq!(harness.monitoring.transitions().len(), 1);
}

#[tokio::test]
async fn transient_failure_is_retried_on_the_next_drain() {
    let harness = TestHarness::new(3);
    let id = harness.approved_handover("PO-4500102").await;
    harness.erp.fail_next(1);

    let first = harness.dispatcher.drain().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.succeeded, 1);

    let doc = harness.documents.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Pending);
    assert_eq!(doc.monitoring_sync_status(), MonitoringSyncStatus::Synced);

    let second = harness.dispatcher.drain().await.unwrap();
    assert_eq!(second.attempted, 1);
    assert_eq!(second.succeeded, 1);

    let job = harness
        .dispatcher
        .get_job(id, IntegrationKind::GoodsReceipt)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.attempts(), 2);
    assert_eq!(job.last_error(), Some("ERP service error: ERP timeout"));

    let doc = harness.documents.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Success);
}

#[tokio::test]
async fn exhausted_retries_mark_failed_but_keep_the_approval() {
    let harness = TestHarness::new(2);
    let id = harness.approved_handover("PO-4500103").await;
    harness.erp.set_always_fail(true);

    harness.dispatcher.drain().await.unwrap();
    let doc = harness.documents.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Pending);

    let second = harness.dispatcher.drain().await.unwrap();
    assert_eq!(second.abandoned, 1);

    let doc = harness.documents.get_document(id).await.unwrap().unwrap();
    assert_eq!(doc.status(), DocumentStatus::Approved);
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Failed);
    assert_eq!(doc.monitoring_sync_status(), MonitoringSyncStatus::Synced);

    let job = harness
        .dispatcher
        .get_job(id, IntegrationKind::GoodsReceipt)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.state(), JobState::Abandoned);

    // abandoned jobs are not retried
    harness.erp.set_always_fail(false);
    assert_eq!(harness.dispatcher.drain().await.unwrap(), DrainReport::default());
    assert_eq!(harness.erp.receipt_count(), 0);
}

#[tokio::test]
async fn inspections_and_open_handovers_queue_nothing() {
    let harness = TestHarness::new(3);

    let cmd = CreateDocument::new(
        DocumentType::Inspection,
        "PO-4500104",
        "V-310",
        UserId::new("v.maker"),
    )
    .with_parties(vec![
        PartyProfile::new(RoleType::MakerVendor, "v.maker", "Vera"),
        PartyProfile::new(RoleType::MakerPln, "p.maker", "Dewi"),
        PartyProfile::new(RoleType::ApproverPln, "p.approve", "Budi"),
    ])
    .with_details(DetailLines::Inspection(vec![InspectionDetail {
        material_code: None,
        material_description: "kWh meter 1 phase".to_string(),
        unit_of_measure: "PCS".to_string(),
        ordered_quantity: Decimal::from(200),
        previously_received_quantity: Decimal::ZERO,
        inspected_quantity: Decimal::from(200),
        approved_quantity: Decimal::from(200),
        rejected_quantity: Decimal::ZERO,
        inspection_date: NaiveDate::from_ymd_opt(2026, 10, 8),
        inspection_location: None,
        verified_by_both_parties: true,
        quality_result: QualityResult::Passed,
        notes: None,
    }]));
    let id = cmd.document_id;
    harness.documents.create_document(cmd).await.unwrap();
    harness
        .documents
        .submit_document(SubmitDocument::new(id, UserId::new("v.maker")))
        .await
        .unwrap();
    let doc = harness
        .documents
        .process_approval(RecordDecision::approve(id, UserId::new("p.approve")))
        .await
        .unwrap()
        .aggregate;
    assert_eq!(doc.status(), DocumentStatus::Approved);

    assert!(harness.dispatcher.pending_requests().await.unwrap().is_empty());
    assert_eq!(harness.dispatcher.drain().await.unwrap(), DrainReport::default());
    assert_eq!(harness.erp.receipt_count(), 0);
}

#[tokio::test]
async fn each_handover_gets_its_own_jobs() {
    let harness = TestHarness::new(3);
    let first = harness.approved_handover("PO-4500105").await;
    let second = harness.approved_handover("PO-4500106").await;

    let report = harness.dispatcher.drain().await.unwrap();

    assert_eq!(report.succeeded, 4);
    assert_eq!(harness.dispatcher.pending_requests().await.unwrap().len(), 2);
    assert_eq!(harness.erp.posted_orders(), vec!["PO-4500105", "PO-4500106"]);
    for id in [first, second] {
        for kind in [IntegrationKind::GoodsReceipt, IntegrationKind::MonitoringSync] {
            let job = harness.dispatcher.get_job(id, kind).await.unwrap().unwrap();
            assert_eq!(job.document_id(), Some(id));
            assert_eq!(job.state(), JobState::Succeeded);
        }
    }
}

#[tokio::test]
async fn overlapping_drains_of_one_dispatcher_run_once() {
    let harness = TestHarness::with(InMemoryEventStore::new(), SlowErp::default(), 3);
    harness.approved_handover("PO-4500107").await;

    let (a, b) = tokio::join!(harness.dispatcher.drain(), harness.dispatcher.drain());

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.succeeded + b.succeeded, 2);
    assert!(a == DrainReport::default() || b == DrainReport::default());
    assert_eq!(harness.erp.inner.receipt_count(), 1);
}

#[tokio::test]
async fn dispatchers_sharing_a_store_claim_each_attempt_once() {
    let harness = TestHarness::with(InMemoryEventStore::new(), SlowErp::default(), 3);
    let id = harness.approved_handover("PO-4500108").await;
    let other = harness.second_dispatcher();

    let (a, b) = tokio::join!(harness.dispatcher.drain(), other.drain());

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.attempted + b.attempted, 2);
    assert_eq!(a.errors + b.errors, 0);
    assert_eq!(harness.erp.inner.receipt_count(), 1);
    assert_eq!(harness.monitoring.transitions().len(), 1);

    let job = harness
        .dispatcher
        .get_job(id, IntegrationKind::GoodsReceipt)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.state(), JobState::Succeeded);
    assert_eq!(job.attempts(), 1);
}

#[tokio::test]
async fn result_lost_after_delivery_is_settled_on_the_next_drain() {
    let harness = TestHarness::with(ResultRejectingStore::default(), InMemoryErpService::new(), 3);
    let first_id = harness.approved_handover("PO-4500109").await;
    let second_id = harness.approved_handover("PO-4500110").await;

    // the first result write fails; the rest of the pass carries on
    let first = harness.dispatcher.drain().await.unwrap();
    assert_eq!(first.attempted, 4);
    assert_eq!(first.succeeded, 4);
    assert_eq!(first.errors, 1);

    let doc = harness.documents.get_document(first_id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Pending);
    let doc = harness.documents.get_document(second_id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Success);

    let second = harness.dispatcher.drain().await.unwrap();
    assert_eq!(second.attempted, 0);
    assert_eq!(second.reconciled, 1);
    assert_eq!(second.errors, 0);

    let doc = harness.documents.get_document(first_id).await.unwrap().unwrap();
    assert_eq!(doc.goods_receipt_status(), GoodsReceiptStatus::Success);
    assert_eq!(doc.monitoring_sync_status(), MonitoringSyncStatus::Synced);
    assert_eq!(harness.erp.receipt_count(), 2);

    assert_eq!(harness.dispatcher.drain().await.unwrap(), DrainReport::default());
}
