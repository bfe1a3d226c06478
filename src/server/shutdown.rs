//! Signal-triggered shutdown
//!
//! Bridges OS termination signals to the coordinator: wait for SIGTERM or
//! SIGINT, then drive the graceful shutdown sequence exactly once. The
//! trigger is generic so tests can fire it without raising signals.

use crate::manager::{Coordinator, ShutdownError};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Wait for SIGTERM or SIGINT.
///
/// Returns the name of the signal that was received.
///
/// # Panics
/// Panics if signal handlers cannot be registered (OS resource exhaustion).
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("cannot register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("cannot register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
            "SIGTERM"
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
            "SIGINT"
        }
    }
}

/// Wait for Ctrl+C (non-unix platforms).
///
/// # Panics
/// Panics if the Ctrl+C handler cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    tokio::signal::ctrl_c()
        .await
        .expect("cannot register Ctrl+C handler");
    info!("Received Ctrl+C");
    "CTRL_C"
}

/// Await `trigger`, then drive the coordinator through graceful shutdown.
///
/// The trigger is any future: a signal stream in production, an
/// immediately-ready future in tests.
pub async fn shutdown_on<F>(trigger: F, coordinator: Arc<Coordinator>) -> Result<(), ShutdownError>
where
    F: Future<Output = ()>,
{
    trigger.await;
    coordinator.shutdown().await
}

/// Production wiring: shut down on the first SIGTERM/SIGINT.
pub async fn shutdown_on_signal(coordinator: Arc<Coordinator>) -> Result<(), ShutdownError> {
    shutdown_on(
        async {
            let signal = wait_for_signal().await;
            info!(signal = signal, "Initiating graceful shutdown");
        },
        coordinator,
    )
    .await
}
