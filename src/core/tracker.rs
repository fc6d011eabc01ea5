//! Completion tracking for outstanding workers

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Counts workers that have not yet confirmed termination
///
/// Unlike a one-shot wait group, registrations may continue while another
/// thread is waiting, which is what lets a worker spawned during shutdown
/// still be waited for.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl CompletionTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one outstanding worker
    pub fn register(&self) {
        *self.inner.outstanding.lock() += 1;
    }

    /// Mark one worker as terminated
    pub fn done(&self) {
        let mut outstanding = self.inner.outstanding.lock();
        debug_assert!(*outstanding > 0, "completion tracker underflow");
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.inner.drained.notify_all();
        }
    }

    /// Number of workers still outstanding
    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.lock()
    }

    /// Block until every registered worker has called [`done`](Self::done)
    pub fn wait(&self) {
        let mut outstanding = self.inner.outstanding.lock();
        while *outstanding > 0 {
            self.inner.drained.wait(&mut outstanding);
        }
    }
}
