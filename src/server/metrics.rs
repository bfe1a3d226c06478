//! Prometheus metrics for the orchestrator
//!
//! The core never touches prometheus; gauges are sampled from the
//! [`Coordinator`] at scrape time by the HTTP layer.

use crate::manager::Coordinator;
use prometheus::{Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Cloneable handle on the metrics registry.
#[derive(Clone)]
pub struct SharedMetrics {
    inner: Arc<Metrics>,
}

struct Metrics {
    registry: Registry,
    health_requests: IntCounter,
    active_connections: IntGauge,
    registered_servers: IntGauge,
    uptime_seconds: Gauge,
}

/// Build the registry and register all collectors.
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new();

    let health_requests = IntCounter::new(
        "sammu_health_requests_total",
        "Total health status queries served",
    )?;
    let active_connections = IntGauge::new(
        "sammu_active_connections",
        "In-flight connections tracked by the orchestrator",
    )?;
    let registered_servers = IntGauge::new(
        "sammu_registered_servers",
        "Servers currently registered with the orchestrator",
    )?;
    let uptime_seconds = Gauge::new("sammu_uptime_seconds", "Orchestrator uptime in seconds")?;

    registry.register(Box::new(health_requests.clone()))?;
    registry.register(Box::new(active_connections.clone()))?;
    registry.register(Box::new(registered_servers.clone()))?;
    registry.register(Box::new(uptime_seconds.clone()))?;

    Ok(SharedMetrics {
        inner: Arc::new(Metrics {
            registry,
            health_requests,
            active_connections,
            registered_servers,
            uptime_seconds,
        }),
    })
}

impl SharedMetrics {
    /// Count one served health query.
    pub fn record_health_request(&self) {
        self.inner.health_requests.inc();
    }

    /// Refresh the gauges from the coordinator's current state.
    pub fn observe(&self, coordinator: &Coordinator) {
        self.inner
            .active_connections
            .set(coordinator.connection_count());
        self.inner
            .registered_servers
            .set(coordinator.registered_servers() as i64);
        self.inner
            .uptime_seconds
            .set(coordinator.uptime().as_secs_f64());
    }

    /// Encode the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.inner.registry.gather())
    }
}
