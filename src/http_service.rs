use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::warn;

use crate::metrics::ExporterMetrics;

/// Read-only view shared with the HTTP handlers: the metrics registry and
/// the health flag the poller writes.
#[derive(Clone)]
pub struct HttpState {
    pub metrics: Arc<ExporterMetrics>,
    pub healthy: Arc<AtomicBool>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        state.metrics.encode(),
    )
}

async fn healthz(State(state): State<HttpState>) -> impl IntoResponse {
    if state.healthy.load(Ordering::Relaxed) {
        (StatusCode::OK, "ok")
    } else {
        warn!("health check failed");
        (StatusCode::SERVICE_UNAVAILABLE, "sensor error")
    }
}
