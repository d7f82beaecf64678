//! # Watchdog Trait
//!
//! Defines the supervisor contract for worker lifecycle management. The
//! `railsim` binary's `MultiWorkerController` implements this trait to
//! spawn, monitor, restart, and shut down worker tasks.
//!
//! # Design
//!
//! The trait is deliberately thin — it captures the four core operations
//! any watchdog implementation must provide, without mandating a specific
//! process/task management strategy (OS process, tokio task, thread).

use std::path::Path;

/// Identifies a managed worker by its assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagedModule(pub u32);

/// Health status returned by [`Watchdog::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Worker is running and its tick heartbeat is current.
    Healthy,
    /// Worker is alive but its tick heartbeat is stale (possible hang).
    Stale {
        /// Seconds since the last observed tick.
        age_secs: u64,
    },
    /// Worker task has exited.
    Dead {
        /// Exit code / panic reason discriminant, if available.
        exit_code: Option<i32>,
    },
    /// Worker was never started or is not being tracked.
    Unknown,
}

/// Error type for watchdog operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// Failed to spawn the requested worker.
    #[error("failed to spawn worker {module:?}: {reason}")]
    SpawnFailed {
        module: ManagedModule,
        reason: String,
    },

    /// Worker did not become ready within the expected timeout.
    #[error("worker {module:?} not ready after {timeout_s:.1}s")]
    ReadyTimeout {
        module: ManagedModule,
        timeout_s: f64,
    },

    /// Maximum restart attempts exhausted.
    #[error("max restarts ({max}) exhausted for worker {module:?}")]
    RestartsExhausted { module: ManagedModule, max: u32 },

    /// Generic I/O or system error.
    #[error("watchdog error: {0}")]
    Other(String),
}

/// Supervisor contract for worker lifecycle management.
///
/// Implementors manage worker spawning, health monitoring, restart with
/// backoff, and coordinated shutdown.
pub trait Watchdog {
    /// Spawn a worker task.
    ///
    /// Returns an opaque handle id (e.g. OS thread id or tokio task id) on
    /// success. `config_dir` is forwarded so the worker can locate its fab
    /// map/config files.
    fn spawn_module(
        &mut self,
        module: ManagedModule,
        config_dir: &Path,
    ) -> Result<u32, WatchdogError>;

    /// Query the health of a managed worker.
    ///
    /// Combines task-liveness checks with tick-heartbeat staleness.
    fn health_check(&self, module: ManagedModule) -> HealthStatus;

    /// Restart a worker that has died or become unhealthy.
    ///
    /// Expected sequence:
    /// 1. Abort the existing task if still alive.
    /// 2. Reassign its fabs to the replacement.
    /// 3. Re-spawn with the same configuration.
    /// 4. Return the new handle id.
    fn restart_module(&mut self, module: ManagedModule) -> Result<u32, WatchdogError>;

    /// Shut down all managed workers.
    ///
    /// Expected sequence:
    /// 1. Send `DISPOSE` to each worker.
    /// 2. Wait up to [`crate::consts::DISPOSE_TIMEOUT_MS`] for `DISPOSED`.
    /// 3. Force-terminate any worker that didn't acknowledge in time.
    fn shutdown_all(&mut self) -> Result<(), WatchdogError>;
}
