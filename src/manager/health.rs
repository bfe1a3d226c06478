//! Health probes and status aggregation
//!
//! Probes are synchronous, zero-argument and infallible by signature: a
//! failing dependency is reported as a probe *returning* an unhealthy
//! [`HealthCheck`], never as an error. Probes run under a read lock, so a
//! slow probe serializes every concurrent status query behind it — keep
//! them cheap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Status reported by a single probe.
///
/// `unhealthy`, `error` and `critical` are synonyms for the error bucket;
/// adapters ported from different stacks use different words for the same
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Healthy,
    Warning,
    Unhealthy,
    Error,
    Critical,
}

impl ProbeStatus {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ProbeStatus::Unhealthy | ProbeStatus::Error | ProbeStatus::Critical
        )
    }
}

/// Point-in-time result of one probe call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: ProbeStatus,
    pub message: String,
    /// Probe call duration, stamped by the aggregator.
    pub duration_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheck {
    pub fn new(status: ProbeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            duration_ms: 0,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Healthy, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Warning, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ProbeStatus::Unhealthy, message)
    }
}

/// Aggregate status of the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Warning,
    Unhealthy,
    ShuttingDown,
}

/// Full health snapshot, produced on demand and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: OverallStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub connections: i64,
    pub checks: BTreeMap<String, HealthCheck>,
}

/// A named health probe. Closures register via the blanket impl.
pub trait HealthProbe: Send + Sync {
    fn probe(&self) -> HealthCheck;
}

impl<F> HealthProbe for F
where
    F: Fn() -> HealthCheck + Send + Sync,
{
    fn probe(&self) -> HealthCheck {
        self()
    }
}

/// Name-keyed probe registry. Re-registering a name replaces the probe.
pub(crate) struct ProbeRegistry {
    probes: RwLock<BTreeMap<String, Arc<dyn HealthProbe>>>,
}

impl ProbeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            probes: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn add(&self, name: impl Into<String>, probe: impl HealthProbe + 'static) {
        self.probes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(probe));
    }

    /// Run every probe and fold the results into one overall status.
    ///
    /// Probe results take precedence over the shutdown flag: any error-class
    /// result forces `unhealthy` and any warning forces `warning`, even
    /// while `shutting_down` is set.
    pub(crate) fn evaluate(
        &self,
        shutting_down: bool,
    ) -> (OverallStatus, BTreeMap<String, HealthCheck>) {
        let mut status = if shutting_down {
            OverallStatus::ShuttingDown
        } else {
            OverallStatus::Healthy
        };

        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        let mut checks = BTreeMap::new();
        let mut saw_warning = false;
        let mut saw_error = false;

        for (name, probe) in probes.iter() {
            let started = Instant::now();
            let mut check = probe.probe();
            check.duration_ms = started.elapsed().as_millis() as u64;

            saw_error |= check.status.is_error();
            saw_warning |= check.status == ProbeStatus::Warning;
            checks.insert(name.clone(), check);
        }

        if saw_error {
            status = OverallStatus::Unhealthy;
        } else if saw_warning {
            status = OverallStatus::Warning;
        }

        (status, checks)
    }
}
