//! HTTP API for the BA document approval workflow.
//!
//! Provides REST endpoints for drafting, submitting, reviewing and approving
//! Berita Acara documents, the document board and dashboards, and a trigger
//! for delivering approved handovers downstream. Requests are traced with
//! `tracing` and counted in Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{DocumentService, WorkflowSettings};
use event_store::EventStore;
use integration::{InMemoryErpService, InMemoryOrderMonitoringService, IntegrationDispatcher};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{AuditLogView, DocumentBoardView, Projection, ProjectionProcessor};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::documents::AppState;
use routes::metrics::MetricsState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::documents;

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get::<S>))
        .with_state(MetricsState {
            handle: metrics_handle,
            app: Arc::clone(&state),
        });

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/documents",
            post(documents::create::<S>).get(documents::list::<S>),
        )
        .route("/documents/kpi", get(documents::kpi::<S>))
        .route("/documents/action-items", get(documents::action_items::<S>))
        .route(
            "/documents/{id}",
            get(documents::get::<S>).patch(documents::update::<S>),
        )
        .route(
            "/documents/{id}/parties",
            axum::routing::put(documents::assign_parties::<S>),
        )
        .route(
            "/documents/{id}/details",
            axum::routing::put(documents::save_details::<S>),
        )
        .route(
            "/documents/{id}/attachments",
            post(documents::add_attachment::<S>),
        )
        .route("/documents/{id}/submit", post(documents::submit::<S>))
        .route("/documents/{id}/review", post(documents::review::<S>))
        .route("/documents/{id}/approval", post(documents::approval::<S>))
        .route("/documents/{id}/cancel", post(documents::cancel::<S>))
        .route("/documents/{id}/reopen", post(documents::reopen::<S>))
        .route("/documents/{id}/transition", post(documents::transition::<S>))
        .route("/documents/{id}/signatures", post(documents::signatures::<S>))
        .route(
            "/documents/{id}/lock",
            post(documents::lock::<S>).delete(documents::unlock::<S>),
        )
        .route("/documents/{id}/history", get(documents::history::<S>))
        .route("/documents/{id}/events", get(documents::events::<S>))
        .route("/audit", get(documents::audit::<S>))
        .route("/integrations/drain", post(documents::drain::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-process downstream services.
pub fn create_default_state<S: EventStore + Clone + 'static>(event_store: S) -> Arc<AppState<S>> {
    create_state(event_store, &Config::default())
}

/// Creates the application state using the workflow and retry settings of `config`.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let settings: WorkflowSettings = config.workflow_settings();
    let documents = DocumentService::with_settings(event_store.clone(), settings);
    let dispatcher = IntegrationDispatcher::new(
        event_store.clone(),
        InMemoryErpService::new(),
        InMemoryOrderMonitoringService::new(),
    )
    .with_max_retries(config.integration_max_retries);

    let board = Arc::new(DocumentBoardView::new());
    let audit_log = Arc::new(AuditLogView::new());

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(board.as_ref().clone()) as Box<dyn Projection>);
    processor.register(Box::new(audit_log.as_ref().clone()) as Box<dyn Projection>);

    Arc::new(AppState {
        documents,
        dispatcher,
        board,
        audit_log,
        event_store,
        projection_processor: Arc::new(processor),
    })
}
