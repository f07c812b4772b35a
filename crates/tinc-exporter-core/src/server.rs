//! HTTP exporter: axum router serving the scrape endpoint.
//!
//! Every request to the metrics path triggers a fresh poll of the daemon;
//! nothing is cached between scrapes.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::collector::{Collector, PrometheusSink};
use crate::exporter::ShutdownSignal;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared state accessible to all route handlers.
pub struct ExporterState {
    pub collector: Collector,
}

/// Exporter health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub git_hash: String,
    pub build_profile: String,
}

/// Build the axum router with the metrics and health routes.
pub fn router(state: Arc<ExporterState>, metrics_path: &str) -> axum::Router {
    axum::Router::new()
        .route(metrics_path, get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve `app` on `listener` until the shutdown signal is received.
pub async fn serve(
    listener: TcpListener,
    app: axum::Router,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "exporter listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("exporter shutting down");
        })
        .await
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_metrics(State(state): State<Arc<ExporterState>>) -> impl IntoResponse {
    let report = state.collector.poll().await;
    let mut sink = PrometheusSink::new(state.collector.network());
    report.record(&mut sink);
    let body = sink.render();
    debug!(bytes = body.len(), "scrape rendered");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        body,
    )
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::build_info::VERSION.to_string(),
        git_hash: crate::build_info::GIT_HASH.to_string(),
        build_profile: crate::build_info::BUILD_PROFILE.to_string(),
    })
}
