//! HTTP API for monitor status and Prometheus metrics
//!
//! Serves observers only; the monitoring loop never depends on these
//! endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use monitor_lib::models::{CycleResult, HealthStatus};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub latest: Arc<RwLock<Option<CycleResult>>>,
}

impl AppState {
    pub fn new(latest: Arc<RwLock<Option<CycleResult>>>) -> Self {
        Self { latest }
    }
}

/// Health of the monitored application as of the last completed cycle.
/// Returns 200 while starting up or healthy, 503 once a cycle has observed
/// an unhealthy target.
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let latest = state.latest.read().await;

    match latest.as_ref().and_then(|r| r.health_check.as_ref()) {
        None => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "starting" })),
        ),
        Some(health) if health.status == HealthStatus::Healthy => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "healthy" })),
        ),
        Some(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unhealthy" })),
        ),
    }
}

/// Full last cycle result as JSON (null until the first cycle completes)
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let latest = state.latest.read().await;
    Json(latest.clone())
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
