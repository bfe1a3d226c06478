//! Tests for the in-flight connection tracker

use super::connections::ConnectionTracker;
use std::time::Duration;

/// Increment and decrement move the shared count
#[test]
fn test_counter_increment_decrement() {
    let tracker = ConnectionTracker::new();
    assert_eq!(tracker.count(), 0);

    assert_eq!(tracker.increment(), 1);
    assert_eq!(tracker.increment(), 2);
    assert_eq!(tracker.decrement(), 1);
    assert_eq!(tracker.count(), 1);
}

/// Unbalanced decrements go negative; the counter never clamps
#[test]
fn test_counter_can_go_negative() {
    let tracker = ConnectionTracker::new();

    assert_eq!(tracker.decrement(), -1);
    assert_eq!(tracker.decrement(), -2);
    assert_eq!(tracker.count(), -2);
}

/// Clones share the same underlying counter
#[test]
fn test_tracker_clones_share_count() {
    let tracker = ConnectionTracker::new();
    let clone = tracker.clone();

    tracker.increment();
    clone.increment();

    assert_eq!(tracker.count(), 2);
    assert_eq!(clone.count(), 2);
}

/// An already-drained tracker returns immediately
#[tokio::test]
async fn test_drain_returns_immediately_at_zero() {
    let tracker = ConnectionTracker::new();

    let result =
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_for_drain(Duration::from_secs(5)))
            .await;

    assert!(result.is_ok(), "drain at zero must not wait out the window");
    assert!(result.unwrap().is_ok());
}

/// Connections released inside the window let the drain succeed
#[tokio::test]
async fn test_drain_converges_when_connections_finish() {
    let tracker = ConnectionTracker::new();
    for _ in 0..3 {
        tracker.increment();
    }

    let releasing = tracker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        for _ in 0..3 {
            releasing.decrement();
        }
    });

    tracker
        .wait_for_drain(Duration::from_secs(2))
        .await
        .expect("drain should converge once connections are released");
}

/// A window shorter than the release delay times out and names the
/// remaining count
#[tokio::test]
async fn test_drain_timeout_reports_remaining() {
    let tracker = ConnectionTracker::new();
    tracker.increment();
    tracker.increment();

    let err = tracker
        .wait_for_drain(Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(err.remaining, 2);
    assert_eq!(err.window, Duration::from_millis(50));
    assert!(err.to_string().contains("2 connection(s)"));
}
