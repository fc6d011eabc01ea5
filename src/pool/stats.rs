//! Pool-wide statistics
//!
//! [`PoolCounters`] holds the live atomic counters shared between the pool
//! and its workers; [`PoolStats`] is a plain snapshot of them.

use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time snapshot of pool statistics.
///
/// Values are read independently and are not transactional with respect to
/// in-flight resize operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Workers not yet confirmed terminated
    pub workers: usize,
    /// Workers currently running a handler
    pub busy: usize,
    /// Workers ever spawned
    pub spawned: u64,
    /// Workers that terminated, for any reason
    pub terminated: u64,
    /// Messages accepted by a worker
    pub messages_sent: u64,
    /// Messages whose handler returned `Ok`
    pub messages_handled: u64,
    /// Messages whose handler returned an error
    pub messages_failed: u64,
    /// Messages whose handler panicked
    pub messages_panicked: u64,
    /// Whether `close` has been called
    pub closed: bool,
}

impl PoolStats {
    /// Workers that are alive but idle
    pub fn idle(&self) -> usize {
        self.workers.saturating_sub(self.busy)
    }

    /// Serialize the snapshot as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Live counters shared by the pool and its workers
#[derive(Debug, Default)]
pub struct PoolCounters {
    busy: CachePadded<AtomicUsize>,
    spawned: AtomicU64,
    terminated: AtomicU64,
    messages_sent: AtomicU64,
    messages_handled: AtomicU64,
    messages_failed: AtomicU64,
    messages_panicked: AtomicU64,
}

impl PoolCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a worker as running a handler
    pub(crate) fn set_busy(&self) {
        self.busy.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark a worker as idle again
    pub(crate) fn set_idle(&self) {
        self.busy.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current number of busy workers
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn record_spawned(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_terminated(&self) {
        self.terminated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self) {
        self.messages_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.messages_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Build a snapshot; `workers` and `closed` come from the pool
    pub(crate) fn snapshot(&self, workers: usize, closed: bool) -> PoolStats {
        PoolStats {
            workers,
            busy: self.busy(),
            spawned: self.spawned.load(Ordering::Relaxed),
            terminated: self.terminated.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            messages_panicked: self.messages_panicked.load(Ordering::Relaxed),
            closed,
        }
    }
}
