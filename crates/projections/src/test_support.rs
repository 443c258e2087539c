//! Document fixtures shared by the view tests.

use common::{AggregateId, UserId};
use domain::document::{InspectionDetail, QualityResult};
use domain::{
    CreateDocument, DetailLines, DocumentService, DocumentType, PartyProfile, RoleType,
    SubmitDocument,
};
use event_store::{EventStore, InMemoryEventStore};
use futures_util::StreamExt;
use rust_decimal::Decimal;

use crate::projection::Projection;

fn parties() -> Vec<PartyProfile> {
    vec![
        PartyProfile::new(RoleType::MakerVendor, "v.maker", "Vera"),
        PartyProfile::new(RoleType::MakerPln, "p.maker", "Dewi"),
        PartyProfile::new(RoleType::CheckerPln, "p.check", "Putu"),
        PartyProfile::new(RoleType::ApproverPln, "p.approve", "Budi"),
    ]
}

fn inspection_lines() -> DetailLines {
    DetailLines::Inspection(vec![InspectionDetail {
        material_code: None,
        material_description: "Cable NA2XSEFGBY".to_string(),
        unit_of_measure: "M".to_string(),
        ordered_quantity: Decimal::from(500),
        previously_received_quantity: Decimal::ZERO,
        inspected_quantity: Decimal::from(500),
        approved_quantity: Decimal::from(500),
        rejected_quantity: Decimal::ZERO,
        inspection_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 2),
        inspection_location: None,
        verified_by_both_parties: true,
        quality_result: QualityResult::Passed,
        notes: None,
    }])
}

pub(crate) async fn draft_inspection(
    store: &InMemoryEventStore,
) -> (DocumentService<InMemoryEventStore>, AggregateId) {
    let service = DocumentService::new(store.clone());
    let cmd = CreateDocument::new(DocumentType::Inspection, "PO-4500012", "V-778", UserId::new("v.maker"))
        .with_parties(parties())
        .with_details(inspection_lines());
    let id = cmd.document_id;
    service.create_document(cmd).await.unwrap();
    (service, id)
}

pub(crate) async fn in_review_inspection(
    store: &InMemoryEventStore,
) -> (DocumentService<InMemoryEventStore>, AggregateId) {
    let (service, id) = draft_inspection(store).await;
    service
        .submit_document(SubmitDocument::new(id, UserId::new("v.maker")))
        .await
        .unwrap();
    (service, id)
}

/// A makers-only handover, approved on submit.
pub(crate) async fn approved_handover(store: &InMemoryEventStore) -> AggregateId {
    use domain::document::{HandoverDetail, ItemCondition};

    let service = DocumentService::new(store.clone());
    let lines = DetailLines::Handover(vec![HandoverDetail {
        material_code: None,
        material_description: "Cable NA2XSEFGBY".to_string(),
        unit_of_measure: "M".to_string(),
        ordered_quantity: Decimal::from(500),
        already_handed_over_quantity: Decimal::ZERO,
        this_handover_quantity: Decimal::from(500),
        remaining_quantity: Decimal::ZERO,
        handover_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 9),
        delivery_location: "Gudang Cawang".to_string(),
        verified_by_both_parties: true,
        condition: ItemCondition::Good,
        notes: None,
    }]);
    let cmd = CreateDocument::new(DocumentType::Handover, "PO-4500012", "V-778", UserId::new("v.maker"))
        .with_parties(parties().into_iter().take(2).collect())
        .with_details(lines);
    let id = cmd.document_id;
    service.create_document(cmd).await.unwrap();
    service
        .submit_document(SubmitDocument::new(id, UserId::new("v.maker")))
        .await
        .unwrap();
    id
}

/// Feeds every stored event to `view` in store order.
pub(crate) async fn replay(store: &InMemoryEventStore, view: &impl Projection) {
    let mut stream = store.stream_all_events().await.unwrap();
    while let Some(event) = stream.next().await {
        view.handle(&event.unwrap()).await.unwrap();
    }
}
