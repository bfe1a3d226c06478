use anyhow::Context as _;
use async_trait::async_trait;
use sammu::manager::{
    ConnectionTracker, Coordinator, GracefulStop, HealthCheck, ManagedServer,
};
use sammu::server::{create_metrics, run_health_server, shutdown_on_signal};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Default port for the health endpoints
const HEALTH_PORT: u16 = 8080;

/// Default fan-out deadline in seconds
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default connection drain window in seconds
const DRAIN_TIMEOUT_SECS: u64 = 10;

/// Read a u64 env var, falling back to `default` on absence or parse failure
fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get the health endpoint port from env (default: 8080)
fn health_port() -> u16 {
    env_u64("SAMMU_HEALTH_PORT", u64::from(HEALTH_PORT)) as u16
}

/// Parse a comma-separated port list, skipping entries that do not parse
fn parse_port_list(raw: &str) -> Vec<u16> {
    raw.split(',')
        .filter_map(|entry| entry.trim().parse().ok())
        .collect()
}

/// Get the demo echo listener ports from env (default: 7070)
fn echo_ports() -> Vec<u16> {
    match std::env::var("SAMMU_ECHO_PORTS") {
        Ok(raw) => parse_port_list(&raw),
        Err(_) => vec![7070],
    }
}

/// Minimal line-echo listener used to exercise the orchestrator end to end.
///
/// Accepted connections are counted on the coordinator's global tracker, so
/// the drain step observes them. A watch flip stops the accept loop; the
/// coordinator's drain window covers connections already in flight.
struct EchoServer {
    port: u16,
    tracker: ConnectionTracker,
    stop_tx: watch::Sender<bool>,
}

impl EchoServer {
    fn new(port: u16, tracker: ConnectionTracker) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            port,
            tracker,
            stop_tx,
        }
    }

    fn stop_accepting(&self) {
        self.stop_tx.send_replace(true);
    }
}

async fn echo(mut stream: TcpStream) -> std::io::Result<u64> {
    let (mut reader, mut writer) = stream.split();
    tokio::io::copy(&mut reader, &mut writer).await
}

#[async_trait]
impl ManagedServer for EchoServer {
    async fn start(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| format!("failed to bind echo listener on port {}", self.port))?;
        info!(port = self.port, "echo server listening");

        let mut stop_rx = self.stop_tx.subscribe();
        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, peer)) = accepted else { continue };
                        info!(peer = %peer, "echo connection accepted");
                        let tracker = tracker.clone();
                        tokio::spawn(async move {
                            tracker.increment();
                            if let Err(e) = echo(stream).await {
                                warn!(error = %e, "echo connection failed");
                            }
                            tracker.decrement();
                        });
                    }
                }
            }
        });
        Ok(())
    }

    async fn stop(&self, _timeout: Duration) -> anyhow::Result<()> {
        self.stop_accepting();
        Ok(())
    }

    fn graceful(&self) -> Option<&dyn GracefulStop> {
        Some(self)
    }

    fn connection_count(&self) -> Option<i64> {
        Some(self.tracker.count())
    }
}

#[async_trait]
impl GracefulStop for EchoServer {
    async fn stop_graceful(
        &self,
        _timeout: Duration,
        _drain_window: Duration,
    ) -> anyhow::Result<()> {
        // Stop accepting; in-flight connections drain under the
        // coordinator's global drain window.
        self.stop_accepting();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting sammu shutdown orchestrator");

    let coordinator = Arc::new(Coordinator::new());
    coordinator.set_shutdown_timeout(Duration::from_secs(env_u64(
        "SAMMU_SHUTDOWN_TIMEOUT_SECS",
        SHUTDOWN_TIMEOUT_SECS,
    )));
    coordinator.set_drain_timeout(Duration::from_secs(env_u64(
        "SAMMU_DRAIN_TIMEOUT_SECS",
        DRAIN_TIMEOUT_SECS,
    )));

    // Create metrics registry
    let metrics = create_metrics().expect("Failed to create metrics registry");
    info!("Prometheus metrics registry initialized");

    // Register one echo listener per configured port
    for port in echo_ports() {
        let server = EchoServer::new(port, coordinator.connections());
        server.start().await?;
        coordinator.register_server(format!("echo-{}", port), server);
    }

    // Flag heavy connection load instead of failing outright
    let load_tracker = coordinator.connections();
    coordinator.add_health_check("connection-load", move || {
        let open = load_tracker.count();
        if open > 1000 {
            HealthCheck::warning(format!("{} open connections", open))
        } else {
            HealthCheck::healthy(format!("{} open connections", open))
        }
    });

    coordinator.add_pre_shutdown_hook(|| {
        info!("pre-shutdown: flushing in-memory state");
        Ok(())
    });
    coordinator.add_post_shutdown_hook(|| {
        info!("post-shutdown: cleanup finished");
        Ok(())
    });

    // Start health/metrics server in background
    let health_coordinator = Arc::clone(&coordinator);
    let health_metrics = metrics.clone();
    let port = health_port();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = run_health_server(port, health_coordinator, health_metrics).await {
            warn!(error = %e, "Health server failed");
        }
    });
    info!(port = port, "Health server task spawned");

    // Block until SIGTERM/SIGINT, then run the full shutdown sequence
    let result = shutdown_on_signal(Arc::clone(&coordinator)).await;
    health_handle.abort();

    if let Err(e) = result {
        error!(error = %e, "Graceful shutdown failed");
        return Err(e.into());
    }

    info!("sammu shut down gracefully");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
