//! Tests for the HTTP health and metrics endpoints

use super::*;
use crate::manager::{Coordinator, HealthCheck};
use std::sync::Arc;
use std::time::Duration;

/// Wait for server to be ready with retry logic
///
/// Retries connection up to max_retries times with exponential backoff.
/// More reliable than fixed sleep for test environments.
async fn wait_for_server(port: u16, max_retries: u32) -> reqwest::Client {
    let client = reqwest::Client::new();
    let mut delay = Duration::from_millis(10);

    for attempt in 1..=max_retries {
        match client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .timeout(Duration::from_millis(100))
            .send()
            .await
        {
            Ok(_) => return client,
            Err(_) if attempt < max_retries => {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_millis(200));
            }
            Err(e) => panic!("Server not ready after {} attempts: {}", max_retries, e),
        }
    }
    client
}

fn spawn_server(port: u16, coordinator: Arc<Coordinator>) -> tokio::task::JoinHandle<()> {
    let metrics = create_metrics().expect("metrics registry");
    tokio::spawn(async move {
        let _ = run_health_server(port, coordinator, metrics).await;
    })
}

/// /healthz always returns 200
#[tokio::test]
async fn test_healthz_returns_200() {
    let coordinator = Arc::new(Coordinator::new());
    let port = 19080; // Use high port for tests
    let server_handle = spawn_server(port, Arc::clone(&coordinator));

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/healthz", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to connect to health server");

    assert_eq!(response.status(), 200, "Liveness probe should return 200");

    server_handle.abort();
}

/// /readyz flips from 200 to 503 once shutdown begins
#[tokio::test]
async fn test_readyz_returns_503_when_shutting_down() {
    let coordinator = Arc::new(Coordinator::new());
    let port = 19081;
    let server_handle = spawn_server(port, Arc::clone(&coordinator));

    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .send()
        .await
        .expect("Failed to connect to health server");
    assert_eq!(response.status(), 200, "ready before shutdown");

    coordinator.shutdown().await.expect("shutdown");

    let response = client
        .get(format!("http://127.0.0.1:{}/readyz", port))
        .send()
        .await
        .expect("Failed to connect to health server");
    assert_eq!(response.status(), 503, "draining process must not be ready");

    server_handle.abort();
}

/// /health carries the aggregate status and the named checks
#[tokio::test]
async fn test_health_returns_aggregate_json() {
    let coordinator = Arc::new(Coordinator::new());
    coordinator.add_health_check("queue", || HealthCheck::warning("backlog growing"));
    coordinator.increment_connections();

    let port = 19082;
    let server_handle = spawn_server(port, Arc::clone(&coordinator));
    let client = wait_for_server(port, 10).await;

    let body: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to connect to health server")
        .json()
        .await
        .expect("health body should be JSON");

    assert_eq!(body["status"], "warning");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["checks"]["queue"]["status"], "warning");
    assert_eq!(body["checks"]["queue"]["message"], "backlog growing");

    server_handle.abort();
}

/// /metrics exposes the orchestrator gauges in text format
#[tokio::test]
async fn test_metrics_endpoint_exposes_gauges() {
    let coordinator = Arc::new(Coordinator::new());
    coordinator.increment_connections();
    coordinator.increment_connections();

    let port = 19083;
    let server_handle = spawn_server(port, Arc::clone(&coordinator));
    let client = wait_for_server(port, 10).await;

    let body = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to connect to health server")
        .text()
        .await
        .expect("metrics body should be text");

    assert!(body.contains("sammu_active_connections 2"), "body: {}", body);
    assert!(body.contains("sammu_registered_servers 0"), "body: {}", body);
    assert!(body.contains("sammu_uptime_seconds"), "body: {}", body);

    server_handle.abort();
}
