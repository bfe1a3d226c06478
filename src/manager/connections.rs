//! Global in-flight connection accounting
//!
//! The tracker is a manually instrumented counter: server adapters and
//! middleware call [`ConnectionTracker::increment`] when work starts and
//! [`ConnectionTracker::decrement`] when it finishes. It is never derived
//! from the per-server counts that individual adapters may keep internally.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// How often the drain wait re-reads the counter.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connections did not reach zero within the drain window.
#[derive(Debug, Error)]
#[error("connection drain timed out after {window:?}: {remaining} connection(s) still open")]
pub struct DrainError {
    pub window: Duration,
    pub remaining: i64,
}

/// Shared counter of in-flight units of work.
///
/// Clones share the same underlying counter. The value is signed and never
/// clamped: unbalanced decrements drive it negative, which shows up in the
/// drain timeout error rather than being hidden.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    count: Arc<AtomicI64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one unit of work starting. Returns the new count.
    pub fn increment(&self) -> i64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record one unit of work finishing. Returns the new count.
    pub fn decrement(&self) -> i64 {
        self.count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Current number of in-flight connections.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for the counter to reach zero, polling every 100ms.
    ///
    /// Returns [`DrainError`] with the remaining count once `window` has
    /// elapsed. Success requires exactly zero.
    pub async fn wait_for_drain(&self, window: Duration) -> Result<(), DrainError> {
        let deadline = Instant::now() + window;

        loop {
            let remaining = self.count();
            if remaining == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DrainError { window, remaining });
            }
            debug!(remaining, "waiting for connections to drain");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}
