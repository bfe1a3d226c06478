//! The shutdown/health coordination core
//!
//! Everything a process needs to shut a fleet of heterogeneous servers down
//! in bounded time:
//! - [`Coordinator`] - registration, the at-most-once shutdown state machine
//!   and the stop fan-out
//! - [`ConnectionTracker`] - manually instrumented in-flight work counter
//! - [`ShutdownHook`] / [`HealthProbe`] - cleanup and probing capabilities
//! - [`ManagedServer`] / [`GracefulStop`] - the surface an adapter exposes
//!
//! This module has no HTTP or signal handling; those live in
//! [`crate::server`].

mod connections;
mod coordinator;
mod health;
mod hooks;
mod server;

pub use connections::{ConnectionTracker, DrainError};
pub use coordinator::{
    Coordinator, ShutdownError, ShutdownSignal, DEFAULT_DRAIN_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use health::{HealthCheck, HealthProbe, HealthStatus, OverallStatus, ProbeStatus};
pub use hooks::{HookError, HookPhase, ShutdownHook};
pub use server::{GracefulStop, ManagedServer};

#[cfg(test)]
#[path = "connections_test.rs"]
mod connections_tests;

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_tests;

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "hooks_test.rs"]
mod hooks_tests;
