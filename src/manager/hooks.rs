//! Pre- and post-shutdown cleanup hooks
//!
//! Hooks run strictly in registration order. The first failure aborts the
//! remaining hooks of that phase and is returned to the caller; the
//! coordinator logs it and carries on with the shutdown.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// A fallible zero-argument cleanup action.
///
/// Closures register directly via the blanket impl:
///
/// ```rust,ignore
/// coordinator.add_pre_shutdown_hook(|| {
///     flush_cache()?;
///     Ok(())
/// });
/// ```
pub trait ShutdownHook: Send + Sync {
    fn execute(&self) -> anyhow::Result<()>;
}

impl<F> ShutdownHook for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn execute(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Which hook list a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreShutdown,
    PostShutdown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::PreShutdown => write!(f, "pre-shutdown"),
            HookPhase::PostShutdown => write!(f, "post-shutdown"),
        }
    }
}

/// A hook failed; later hooks in the same phase were not run.
#[derive(Debug, Error)]
#[error("{phase} hook #{index} failed: {source}")]
pub struct HookError {
    pub phase: HookPhase,
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Ordered pre/post-shutdown hook lists. Append-only.
pub(crate) struct Hooks {
    pre: RwLock<Vec<Arc<dyn ShutdownHook>>>,
    post: RwLock<Vec<Arc<dyn ShutdownHook>>>,
}

impl Hooks {
    pub(crate) fn new() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add_pre(&self, hook: impl ShutdownHook + 'static) {
        self.pre
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    pub(crate) fn add_post(&self, hook: impl ShutdownHook + 'static) {
        self.post
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Run one phase in registration order, stopping at the first failure.
    ///
    /// The list is snapshotted before iterating: hooks registered while the
    /// phase runs are safe but do not join the in-progress run.
    pub(crate) fn run(&self, phase: HookPhase) -> Result<(), HookError> {
        let list = match phase {
            HookPhase::PreShutdown => &self.pre,
            HookPhase::PostShutdown => &self.post,
        };
        let snapshot: Vec<Arc<dyn ShutdownHook>> = list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, hook) in snapshot.iter().enumerate() {
            hook.execute().map_err(|source| HookError {
                phase,
                index,
                source,
            })?;
        }
        Ok(())
    }
}
