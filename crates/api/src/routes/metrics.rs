//! Prometheus endpoint with document board gauges.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::DocumentStatus;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::DocumentBoardView;

use crate::routes::documents::AppState;

/// State of the metrics route: the exporter plus the views gauges are read from.
pub struct MetricsState<S: EventStore> {
    pub handle: PrometheusHandle,
    pub app: Arc<AppState<S>>,
}

impl<S: EventStore> Clone for MetricsState<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            app: Arc::clone(&self.app),
        }
    }
}

/// Sets `ba_documents{status}` and `ba_documents_awaiting_integration` from the board.
async fn record_board_gauges(board: &DocumentBoardView) {
    let rows = board.all().await;
    for status in DocumentStatus::ALL {
        let count = rows.iter().filter(|row| row.status == status).count();
        metrics::gauge!("ba_documents", "status" => status.as_str()).set(count as f64);
    }
    let awaiting = rows.iter().filter(|row| row.awaits_integration()).count();
    metrics::gauge!("ba_documents_awaiting_integration").set(awaiting as f64);
}

/// GET /metrics — Prometheus text, board gauges refreshed first.
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<MetricsState<S>>,
) -> impl IntoResponse {
    // Stale gauges beat a failed scrape
    if let Err(e) = state.app.projection_processor.run_catch_up().await {
        tracing::warn!(error = %e, "catch-up before scrape failed");
    }
    record_board_gauges(&state.app.board).await;

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.handle.render(),
    )
}
