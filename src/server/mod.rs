//! Operational surface around the orchestration core
//!
//! - HTTP endpoints for liveness, readiness, aggregate health and metrics
//! - Prometheus registry sampled from the coordinator at scrape time
//! - OS-signal wiring that drives the graceful shutdown sequence

mod health;
mod metrics;
pub mod shutdown;

pub use health::run_health_server;
pub use metrics::{create_metrics, SharedMetrics};
pub use shutdown::{shutdown_on, shutdown_on_signal, wait_for_signal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
