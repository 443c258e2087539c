//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let store = InMemoryEventStore::new();
    let state = api::create_default_state(store);
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn parties(with_reviewers: bool) -> Value {
    let mut parties = vec![
        json!({"role": "Maker Vendor", "user_id": "v.maker", "name": "Vera Wijaya"}),
        json!({"role": "Maker PLN", "user_id": "p.maker", "name": "Dewi Lestari"}),
    ];
    if with_reviewers {
        parties.push(json!({"role": "Checker PLN", "user_id": "p.check", "name": "Putu Arya"}));
        parties.push(json!({"role": "Approver PLN", "user_id": "p.approve", "name": "Budi Santoso"}));
    }
    Value::Array(parties)
}

fn inspection_body(with_reviewers: bool) -> Value {
    json!({
        "document_type": "INSPECTION",
        "purchase_order_number": "PO-4500012",
        "vendor_id": "V-778",
        "created_by": "v.maker",
        "parties": parties(with_reviewers),
        "details": {
            "kind": "INSPECTION",
            "lines": [{
                "material_description": "Transformer 20kV",
                "unit_of_measure": "UNIT",
                "ordered_quantity": "10",
                "inspected_quantity": "10",
                "approved_quantity": "10",
                "inspection_date": "2026-10-05",
                "verified_by_both_parties": true,
                "quality_result": "PASSED"
            }]
        }
    })
}

fn handover_body(inspection_id: &str) -> Value {
    json!({
        "document_type": "HANDOVER",
        "purchase_order_number": "PO-4500012",
        "vendor_id": "V-778",
        "created_by": "v.maker",
        "inspection_document_id": inspection_id,
        "parties": parties(false),
        "details": {
            "kind": "HANDOVER",
            "lines": [{
                "material_description": "Transformer 20kV",
                "unit_of_measure": "UNIT",
                "ordered_quantity": "10",
                "this_handover_quantity": "10",
                "remaining_quantity": "0",
                "handover_date": "2026-10-12",
                "delivery_location": "Gudang Cawang",
                "verified_by_both_parties": true,
                "condition": "GOOD"
            }]
        }
    })
}

async fn create(app: &axum::Router, body: Value) -> String {
    let (status, created) = send(app, "POST", "/documents", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created["document_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    create(&app, inspection_body(true)).await;
    send(&app, "GET", "/documents", None).await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["event_store"], "reachable");
    let board = &json["read_models"][0];
    assert_eq!(board["name"], "DocumentBoardView");
    assert_eq!(board["rows"], 1);
    assert!(board["events_processed"].as_u64().unwrap() > 0);
    let audit = &json["read_models"][1];
    assert_eq!(audit["events_processed"], board["events_processed"]);
    assert_eq!(audit["documents"], 1);
}

#[tokio::test]
async fn test_create_document_assigns_number() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/documents", Some(inspection_body(true))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "DRAFT");
    assert!(json["document_number"].as_str().unwrap().starts_with("BAP/"));
    assert!(json["document_number"].as_str().unwrap().ends_with("/0001"));
}

#[tokio::test]
async fn test_get_document_detail() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;

    let (status, json) = send(&app, "GET", &format!("/documents/{id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "DRAFT");
    assert_eq!(json["document"]["parties"].as_array().unwrap().len(), 4);
    // created + parties assigned
    assert_eq!(json["history"].as_array().unwrap().len(), 2);
    assert!(json["linked_inspection"].is_null());
}

#[tokio::test]
async fn test_get_nonexistent_document() {
    let app = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/documents/{fake_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/documents/{fake_id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_document_id_format() {
    let app = setup();

    let (status, _) = send(&app, "GET", "/documents/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_then_approval() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "UNDER_REVIEW");
    assert_eq!(json["events"], json!(["DocumentSubmitted"]));

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/review"),
        Some(json!({"actor": "p.check", "decision": "approved", "comment": "sesuai"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "UNDER_APPROVAL");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/approval"),
        Some(json!({"actor": "p.approve", "decision": "approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "APPROVED");

    let (status, history) = send(&app, "GET", &format!("/documents/{id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions.len(), 5);
    assert_eq!(actions.last(), Some(&"APPROVED"));
}

#[tokio::test]
async fn test_workflow_refusals_conflict() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;
    send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;

    // not a checker
    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/review"),
        Some(json!({"actor": "p.approve", "decision": "approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("no pending action"));

    // under review cannot be cancelled
    let (status, _) = send(
        &app,
        "POST",
        &format!("/documents/{id}/cancel"),
        Some(json!({"actor": "v.maker", "reason": "duplicate"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // approval is reached by decisions only
    let (status, _) = send(
        &app,
        "POST",
        &format!("/documents/{id}/transition"),
        Some(json!({"actor": "v.maker", "target": "APPROVED"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_submit_without_makers_is_unprocessable() {
    let app = setup();
    let mut body = inspection_body(true);
    body["parties"] = json!([]);
    let id = create(&app, body).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!json["findings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_and_reopen() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;
    send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/review"),
        Some(json!({"actor": "p.check", "decision": "rejected", "comment": "wrong quantity"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "REJECTED");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/reopen"),
        Some(json!({"actor": "v.maker", "comment": "quantities fixed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "DRAFT");
    assert_eq!(json["document"]["revision"], 2);

    let (status, json) = send(
        &app,
        "PATCH",
        &format!("/documents/{id}"),
        Some(json!({"actor": "v.maker", "changes": {"notes": "revised"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["notes"], "revised");
}

#[tokio::test]
async fn test_cancel_draft_requires_reason() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/documents/{id}/cancel"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{id}/cancel"),
        Some(json!({"actor": "v.maker", "reason": "wrong vendor"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "CANCELLED");
}

#[tokio::test]
async fn test_edit_lock_blocks_other_actors() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/documents/{id}/lock"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        "PATCH",
        &format!("/documents/{id}"),
        Some(json!({"actor": "p.maker", "changes": {"remarks": "mine"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("v.maker"));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/documents/{id}/lock"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/documents/{id}"),
        Some(json!({"actor": "p.maker", "changes": {"remarks": "mine"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_board_lists_documents_from_projection() {
    let app = setup();
    let first = create(&app, inspection_body(true)).await;
    create(&app, inspection_body(true)).await;
    send(
        &app,
        "POST",
        &format!("/documents/{first}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;

    let (status, rows) = send(&app, "GET", "/documents", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0]["document_number"].as_str().unwrap().ends_with("/0001"));

    let (_, in_review) = send(&app, "GET", "/documents?status=UNDER_REVIEW", None).await;
    assert_eq!(in_review.as_array().unwrap().len(), 1);
    assert_eq!(in_review[0]["document_id"], first.as_str());

    let (_, other_vendor) = send(&app, "GET", "/documents?vendor=V-999", None).await;
    assert!(other_vendor.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_kpi_and_action_items() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;
    create(&app, inspection_body(true)).await;
    send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;

    let (status, kpi) = send(&app, "GET", "/documents/kpi", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kpi["total"], 2);
    assert_eq!(kpi["by_status"]["DRAFT"], 1);
    assert_eq!(kpi["by_status"]["UNDER_REVIEW"], 1);
    assert_eq!(kpi["overdue"], 0);

    let (status, items) = send(&app, "GET", "/documents/action-items?user=p.check", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["document_id"], id.as_str());

    let (_, items) = send(&app, "GET", "/documents/action-items?user=p.approve", None).await;
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_handover_drain_updates_integration_statuses() {
    let app = setup();
    let inspection = create(&app, inspection_body(false)).await;
    let handover = create(&app, handover_body(&inspection)).await;

    // makers only: approved on submit
    let (status, json) = send(
        &app,
        "POST",
        &format!("/documents/{handover}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["document"]["status"], "APPROVED");
    assert_eq!(json["document"]["goods_receipt_status"], "PENDING");
    assert_eq!(
        json["document"]["integration_outbox"]["monitoring_sync"]["previous_stage"],
        "INSPECTED"
    );

    let (status, report) = send(&app, "POST", "/integrations/drain", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["succeeded"], 2);

    let (_, detail) = send(&app, "GET", &format!("/documents/{handover}"), None).await;
    assert_eq!(detail["document"]["goods_receipt_status"], "SUCCESS");
    assert_eq!(detail["document"]["monitoring_sync_status"], "SYNCED");
    assert_eq!(detail["linked_inspection"]["document_type"], "INSPECTION");

    let (_, report) = send(&app, "POST", "/integrations/drain", None).await;
    assert_eq!(report["attempted"], 0);
}

#[tokio::test]
async fn test_handover_with_unknown_inspection_is_refused() {
    let app = setup();
    let fake_id = uuid::Uuid::new_v4().to_string();

    let (status, _) = send(&app, "POST", "/documents", Some(handover_body(&fake_id))).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_audit_log_by_actor() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;
    send(
        &app,
        "POST",
        &format!("/documents/{id}/submit"),
        Some(json!({"actor": "v.maker"})),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/documents/{id}/review"),
        Some(json!({"actor": "p.check", "decision": "approved"})),
    )
    .await;

    let (status, entries) = send(&app, "GET", "/audit?actor=p.check", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "REVIEWED");

    let (_, recent) = send(&app, "GET", "/audit?limit=2", None).await;
    assert_eq!(recent.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_document_events() {
    let app = setup();
    let id = create(&app, inspection_body(true)).await;

    let (status, events) = send(&app, "GET", &format!("/documents/{id}/events"), None).await;

    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events[0]["event_type"], "DocumentCreated");
    assert_eq!(events[0]["version"], 1);
    assert_eq!(events[0]["recorded_by"], "v.maker");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    create(&app, inspection_body(true)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("ba_documents_created_total"));
    assert!(text.contains("ba_documents{status=\"DRAFT\"}"));
    assert!(text.contains("ba_documents_awaiting_integration"));
}
