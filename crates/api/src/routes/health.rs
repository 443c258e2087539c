//! Health endpoint: store reachability and read-model lag.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;
use projections::{Projection, ReadModel};
use serde::Serialize;

use crate::routes::documents::AppState;

#[derive(Serialize)]
pub struct ReadModelHealth {
    pub name: &'static str,
    pub rows: usize,
    pub documents: usize,
    pub events_processed: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub event_store: &'static str,
    pub read_models: Vec<ReadModelHealth>,
}

async fn read_model_health<V: Projection + ReadModel>(view: &V) -> ReadModelHealth {
    let position = view.position().await;
    ReadModelHealth {
        name: ReadModel::name(view),
        rows: view.row_count().await,
        documents: view.document_count().await,
        events_processed: position.events_processed,
        last_event_at: position.last_recorded_at,
    }
}

/// GET /health — store reachability and how far each read model has got.
///
/// Read models are reported as they stand; no catch-up is run here.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    // A lookup of a stream that cannot exist still round-trips to the store
    let store_ok = match state.event_store.stream_version(AggregateId::new()).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "event store unreachable");
            false
        }
    };

    let read_models = vec![
        read_model_health(state.board.as_ref()).await,
        read_model_health(state.audit_log.as_ref()).await,
    ];

    let (status, body_status) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: body_status,
            event_store: if store_ok { "reachable" } else { "unreachable" },
            read_models,
        }),
    )
}
