//! Capability surface of a managed server
//!
//! The orchestrator consumes these traits, it never implements them. Each
//! framework adapter wraps its server in a type implementing
//! [`ManagedServer`]; adapters that can drain in-flight requests also
//! implement [`GracefulStop`] and surface it through
//! [`ManagedServer::graceful`].

use crate::manager::health::HealthCheck;
use async_trait::async_trait;
use std::time::Duration;

/// Minimal contract every registered server must satisfy.
#[async_trait]
pub trait ManagedServer: Send + Sync {
    /// Begin serving. The coordinator never calls this itself; it owns only
    /// the shutdown side of a server's lifecycle.
    async fn start(&self) -> anyhow::Result<()>;

    /// Stop serving within `timeout`.
    async fn stop(&self, timeout: Duration) -> anyhow::Result<()>;

    /// Graceful-stop capability, if the adapter has one.
    ///
    /// The coordinator prefers [`GracefulStop::stop_graceful`] and falls
    /// back to plain [`stop`](ManagedServer::stop) when the graceful call
    /// fails.
    fn graceful(&self) -> Option<&dyn GracefulStop> {
        None
    }

    /// Server-local connection count, if the adapter tracks one. Not used
    /// by the coordinator's own accounting.
    fn connection_count(&self) -> Option<i64> {
        None
    }

    /// Server-local health snapshot, if the adapter reports one.
    fn health_check(&self) -> Option<HealthCheck> {
        None
    }
}

/// Optional drain-aware stop.
#[async_trait]
pub trait GracefulStop: Send + Sync {
    /// Stop within `timeout`, allowing up to `drain_window` for in-flight
    /// work to finish first.
    async fn stop_graceful(&self, timeout: Duration, drain_window: Duration)
        -> anyhow::Result<()>;
}
