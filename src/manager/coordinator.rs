//! The shutdown orchestration core
//!
//! One [`Coordinator`] per process. It accumulates server registrations,
//! hooks and health probes during normal operation, then drives a single
//! bounded-time shutdown: pre-hooks, concurrent per-server stop with
//! graceful fallback, connection drain, post-hooks. Health can be queried
//! at any point, including mid-shutdown.

use crate::manager::connections::ConnectionTracker;
use crate::manager::health::{HealthCheck, HealthProbe, HealthStatus, ProbeRegistry};
use crate::manager::hooks::{HookPhase, Hooks, ShutdownHook};
use crate::manager::server::ManagedServer;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Fan-out deadline when none is configured.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection drain window when none is configured.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced to a shutdown caller.
///
/// Hook failures and drain timeouts are deliberately absent: they are
/// logged and the shutdown proceeds.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown already in progress")]
    AlreadyInProgress,

    #[error("server {name} failed to stop: {source}")]
    ServerStop {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("shutdown timed out after {timeout:?}: {pending} server(s) had not finished stopping")]
    Timeout { timeout: Duration, pending: usize },

    #[error("restart requires an external process supervisor or load balancer")]
    RestartUnsupported,
}

/// Watch-backed view of the shutdown flag.
///
/// Handed to components that need to react when shutdown begins without
/// polling the coordinator.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait until shutdown has been triggered.
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Coordinator dropped, treat as shutdown.
                break;
            }
        }
    }

    /// Check the flag without blocking.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// The orchestration root: server registry, connection tracker, hook
/// sequencer, probe registry and the at-most-once shutdown state machine.
pub struct Coordinator {
    servers: RwLock<HashMap<String, Arc<dyn ManagedServer>>>,
    connections: ConnectionTracker,
    hooks: Hooks,
    probes: ProbeRegistry,
    shutdown_timeout: RwLock<Duration>,
    drain_timeout: RwLock<Duration>,
    shutting_down: AtomicBool,
    started_at: Instant,
    notify: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            servers: RwLock::new(HashMap::new()),
            connections: ConnectionTracker::new(),
            hooks: Hooks::new(),
            probes: ProbeRegistry::new(),
            shutdown_timeout: RwLock::new(DEFAULT_SHUTDOWN_TIMEOUT),
            drain_timeout: RwLock::new(DEFAULT_DRAIN_TIMEOUT),
            shutting_down: AtomicBool::new(false),
            started_at: Instant::now(),
            notify,
        }
    }

    /// Register a server under `name`, silently replacing any existing
    /// handle with that name.
    pub fn register_server(&self, name: impl Into<String>, server: impl ManagedServer + 'static) {
        let name = name.into();
        debug!(server = %name, "registering server");
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(server));
    }

    /// Remove a server. No error if the name is absent.
    pub fn unregister_server(&self, name: &str) {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Number of currently registered servers.
    pub fn registered_servers(&self) -> usize {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn add_pre_shutdown_hook(&self, hook: impl ShutdownHook + 'static) {
        self.hooks.add_pre(hook);
    }

    pub fn add_post_shutdown_hook(&self, hook: impl ShutdownHook + 'static) {
        self.hooks.add_post(hook);
    }

    pub fn add_health_check(&self, name: impl Into<String>, probe: impl HealthProbe + 'static) {
        self.probes.add(name, probe);
    }

    pub fn increment_connections(&self) -> i64 {
        self.connections.increment()
    }

    pub fn decrement_connections(&self) -> i64 {
        self.connections.decrement()
    }

    pub fn connection_count(&self) -> i64 {
        self.connections.count()
    }

    /// A cloneable handle on the global connection tracker, for adapters
    /// and middleware that instrument in-flight work.
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// Set the fan-out deadline. Read once at the start of each shutdown
    /// invocation, never re-read mid-flight.
    pub fn set_shutdown_timeout(&self, timeout: Duration) {
        *self
            .shutdown_timeout
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timeout;
    }

    /// Set the connection drain window. Same read-once semantics.
    pub fn set_drain_timeout(&self, timeout: Duration) {
        *self
            .drain_timeout
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timeout;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Subscribe to the shutdown transition.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.notify.subscribe(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Aggregate health snapshot: probe results folded with the shutdown
    /// flag, plus version, uptime and the connection count.
    pub fn health_status(&self) -> HealthStatus {
        let (status, checks) = self.probes.evaluate(self.is_shutting_down());
        HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            connections: self.connections.count(),
            checks,
        }
    }

    /// Drive the full shutdown sequence. At most one invocation per
    /// coordinator lifetime wins; every later call fails with
    /// [`ShutdownError::AlreadyInProgress`] and has no side effects.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ShutdownError::AlreadyInProgress);
        }
        let _ = self.notify.send(true);

        let shutdown_timeout = *self
            .shutdown_timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let drain_timeout = *self
            .drain_timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        info!(
            shutdown_timeout = ?shutdown_timeout,
            drain_timeout = ?drain_timeout,
            servers = self.registered_servers(),
            "starting graceful shutdown"
        );

        if let Err(e) = self.hooks.run(HookPhase::PreShutdown) {
            warn!(error = %e, "pre-shutdown hook failed, continuing");
        }

        self.stop_servers(shutdown_timeout, drain_timeout).await?;

        if let Err(e) = self.connections.wait_for_drain(drain_timeout).await {
            warn!(error = %e, "connection drain incomplete, continuing");
        }

        if let Err(e) = self.hooks.run(HookPhase::PostShutdown) {
            warn!(error = %e, "post-shutdown hook failed, continuing");
        }

        info!("graceful shutdown complete");
        Ok(())
    }

    /// Fan out stop calls to every registered server and race completion
    /// against the deadline and against the first per-server error.
    ///
    /// On timeout or error, losing tasks are abandoned in place: they keep
    /// running detached and their results are discarded.
    async fn stop_servers(
        &self,
        shutdown_timeout: Duration,
        drain_timeout: Duration,
    ) -> Result<(), ShutdownError> {
        let snapshot: Vec<(String, Arc<dyn ManagedServer>)> = {
            let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
            servers
                .iter()
                .map(|(name, server)| (name.clone(), Arc::clone(server)))
                .collect()
        };
        if snapshot.is_empty() {
            return Ok(());
        }

        let total = snapshot.len();
        let (tx, mut rx) = mpsc::channel::<Result<String, ShutdownError>>(total);

        for (name, server) in snapshot {
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome =
                    stop_server(&name, server.as_ref(), shutdown_timeout, drain_timeout).await;
                let result = match outcome {
                    Ok(()) => Ok(name),
                    Err(source) => Err(ShutdownError::ServerStop { name, source }),
                };
                // Receiver is gone once the race has been decided.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(shutdown_timeout);
        tokio::pin!(deadline);

        let mut finished = 0usize;
        while finished < total {
            tokio::select! {
                _ = &mut deadline => {
                    return Err(ShutdownError::Timeout {
                        timeout: shutdown_timeout,
                        pending: total - finished,
                    });
                }
                msg = rx.recv() => match msg {
                    Some(Ok(name)) => {
                        debug!(server = %name, "server stopped");
                        finished += 1;
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }
        Ok(())
    }

    /// Zero-downtime restart is out of scope: an external load balancer or
    /// process supervisor owns it. Always fails.
    pub fn restart(&self) -> Result<(), ShutdownError> {
        Err(ShutdownError::RestartUnsupported)
    }

    /// Health snapshot of one registered server, if its adapter reports
    /// one. Not folded into [`health_status`](Self::health_status).
    pub fn server_health(&self, name: &str) -> Option<HealthCheck> {
        let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
        servers.get(name).and_then(|server| server.health_check())
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop one server, preferring the graceful capability and falling back to
/// plain stop when the graceful call fails.
async fn stop_server(
    name: &str,
    server: &dyn ManagedServer,
    timeout: Duration,
    drain_window: Duration,
) -> anyhow::Result<()> {
    if let Some(graceful) = server.graceful() {
        match graceful.stop_graceful(timeout, drain_window).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(server = %name, error = %e, "graceful stop failed, falling back to plain stop");
            }
        }
    }
    server.stop(timeout).await
}
