//! Tests for signal-triggered shutdown

use super::shutdown::shutdown_on;
use crate::manager::{Coordinator, ShutdownError};
use std::sync::Arc;

/// A fired trigger drives the coordinator through shutdown
#[tokio::test]
async fn test_trigger_drives_coordinator_shutdown() {
    let coordinator = Arc::new(Coordinator::new());

    shutdown_on(async {}, Arc::clone(&coordinator))
        .await
        .expect("shutdown should succeed");

    assert!(coordinator.is_shutting_down());
}

/// A second trigger is rejected like any other repeat shutdown
#[tokio::test]
async fn test_second_trigger_is_rejected() {
    let coordinator = Arc::new(Coordinator::new());

    shutdown_on(async {}, Arc::clone(&coordinator))
        .await
        .expect("first shutdown should succeed");

    let err = shutdown_on(async {}, Arc::clone(&coordinator))
        .await
        .unwrap_err();
    assert!(matches!(err, ShutdownError::AlreadyInProgress));
}

/// The trigger is awaited before the shutdown starts
#[tokio::test]
async fn test_shutdown_waits_for_trigger() {
    let coordinator = Arc::new(Coordinator::new());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let driving = Arc::clone(&coordinator);
    let handle = tokio::spawn(async move {
        shutdown_on(
            async {
                let _ = rx.await;
            },
            driving,
        )
        .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!coordinator.is_shutting_down(), "must wait for the trigger");

    tx.send(()).expect("trigger");
    handle
        .await
        .expect("task")
        .expect("shutdown should succeed");
    assert!(coordinator.is_shutting_down());
}
