//! HTTP health and metrics endpoints
//!
//! - `/healthz` - Liveness: is the process alive?
//! - `/readyz` - Readiness: 503 once shutdown has begun
//! - `/health` - Full aggregate health snapshot as JSON
//! - `/metrics` - Prometheus metrics in text format

use crate::manager::Coordinator;
use crate::server::metrics::SharedMetrics;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for the health endpoints.
#[derive(Clone)]
pub struct ServerState {
    coordinator: Arc<Coordinator>,
    metrics: SharedMetrics,
}

impl ServerState {
    pub fn new(coordinator: Arc<Coordinator>, metrics: SharedMetrics) -> Self {
        Self {
            coordinator,
            metrics,
        }
    }
}

/// Liveness probe handler.
///
/// Always returns 200 OK - if this responds, the process is alive.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler.
///
/// Returns 503 once shutdown has begun so load balancers stop routing
/// traffic to a draining process.
async fn readyz(State(state): State<ServerState>) -> StatusCode {
    if state.coordinator.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Aggregate health handler.
///
/// Always returns a snapshot, never an error; failing dependencies appear
/// as unhealthy checks inside the body.
async fn health(State(state): State<ServerState>) -> Json<crate::manager::HealthStatus> {
    state.metrics.record_health_request();
    Json(state.coordinator.health_status())
}

/// Prometheus metrics handler.
///
/// Gauges are refreshed from the coordinator on each scrape.
async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    state.metrics.observe(&state.coordinator);
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the router for the health and metrics endpoints.
fn build_router(coordinator: Arc<Coordinator>, metrics: SharedMetrics) -> Router {
    let state = ServerState::new(coordinator, metrics);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        .route("/metrics", get(self::metrics))
        .with_state(state)
}

/// Run the health server on the specified port.
///
/// # Arguments
/// * `port` - The port to listen on
/// * `coordinator` - The orchestrator whose state the endpoints report
/// * `metrics` - Shared metrics registry for Prometheus
///
/// # Returns
/// Runs until the process exits or the listener fails.
pub async fn run_health_server(
    port: u16,
    coordinator: Arc<Coordinator>,
    metrics: SharedMetrics,
) -> Result<(), std::io::Error> {
    let app = build_router(coordinator, metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Health and metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(std::io::Error::other)
}
