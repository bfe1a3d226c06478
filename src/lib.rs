//! # sammu
//!
//! Fleet-wide graceful-shutdown orchestration for heterogeneous servers.
//!
//! A process registers its servers, cleanup hooks and health probes with one
//! [`manager::Coordinator`]; on shutdown the coordinator runs pre-hooks,
//! stops every server concurrently (preferring a graceful drain-aware stop
//! and falling back to plain stop), waits for in-flight connections to
//! drain, runs post-hooks, and returns - all within explicit deadlines.
//! Health can be queried at any time, including mid-shutdown.
//!
//! - [`manager`] - the coordination core: registry, hooks, connection
//!   tracking, health aggregation, the at-most-once shutdown state machine
//! - [`server`] - the operational surface: HTTP health/metrics endpoints
//!   and OS-signal wiring

pub mod manager;
pub mod server;
