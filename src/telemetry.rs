//! Structured tracing events for pool observability.
//!
//! Compiled with the `tracing` feature. Events follow the
//! `counter.*` / `gauge.*` field naming so a tracing-to-metrics bridge can
//! pick them up.
//!
//! # Example
//!
//! ```rust,ignore
//! use resizable_worker_pool::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("resizable_worker_pool=trace".parse().unwrap()))
//!     .init();
//!
//! let pool = WorkerPool::new();
//! pool.add_workers(4)?;
//! ```

/// Metrics recording functions.
pub mod metrics {
    use crate::pool::{ExitReason, PoolStats};

    /// Records a worker thread being spawned.
    #[inline]
    pub fn record_worker_spawned(worker_id: usize) {
        tracing::debug!(counter.workers_spawned = 1, worker_id = worker_id, "worker spawned");
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(gauge.workers_busy = -1i64, worker_id = worker_id, "worker idle");
    }

    /// Records a worker leaving its loop.
    #[inline]
    pub fn record_worker_exit(worker_id: usize, reason: ExitReason) {
        tracing::debug!(
            counter.workers_terminated = 1,
            worker_id = worker_id,
            reason = %reason,
            "worker exited"
        );
    }

    /// Records a completed removal and the workers it retired.
    #[inline]
    pub fn record_workers_removed(worker_ids: &[usize]) {
        tracing::info!(
            counter.workers_removed = worker_ids.len() as u64,
            worker_ids = ?worker_ids,
            "workers removed"
        );
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_close(stats: &PoolStats) {
        tracing::info!(
            workers_spawned = stats.spawned,
            messages_handled = stats.messages_handled,
            messages_failed = stats.messages_failed,
            messages_panicked = stats.messages_panicked,
            "worker pool closed"
        );
    }
}
