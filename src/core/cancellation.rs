//! Cancellation scopes for pool shutdown
//!
//! A [`CancellationToken`] is a one-shot broadcast flag. The pool derives a
//! child token from an optional externally supplied scope, so an embedding
//! system can shut the pool down as part of a larger shutdown tree.
//!
//! # Example
//!
//! ```rust
//! use resizable_worker_pool::CancellationToken;
//!
//! let parent = CancellationToken::new();
//! let child = parent.child();
//!
//! parent.cancel();
//!
//! assert!(parent.is_cancelled());
//! assert!(child.is_cancelled());
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()`
    Manual,
    /// Cancelled because the parent token was cancelled
    ParentCancelled,
    /// Cancelled by `WorkerPool::close`
    PoolClosed,
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::ParentCancelled => write!(f, "parent was cancelled"),
            CancellationReason::PoolClosed => write!(f, "pool closed"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

type Callback = Box<dyn FnOnce() + Send>;

struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancellationReason>>,
    // Registration and draining both happen under this lock, so a callback
    // registered concurrently with `cancel` is either drained or run inline.
    callbacks: Mutex<Vec<Callback>>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            reason: Mutex::new(None),
            callbacks: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        }
    }
}

/// A thread-safe, cloneable cancellation flag
///
/// All clones observe the same state. Cancelling is idempotent; only the
/// first reason is kept.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Creates a child token linked to this parent
    ///
    /// The child is cancelled when the parent is. If the parent is already
    /// cancelled the child starts cancelled. Cancelling the child does not
    /// affect the parent.
    pub fn child(&self) -> Self {
        let child = Self::new();

        {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        if self.is_cancelled() {
            child.cancel_with_reason(CancellationReason::ParentCancelled);
        }

        child
    }

    /// Cancel with [`CancellationReason::Manual`]
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel with a specific reason
    ///
    /// Runs registered callbacks on the calling thread, then cancels children.
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.inner.reason.lock() = Some(reason);

        let callbacks: Vec<Callback> = self.inner.callbacks.lock().drain(..).collect();
        for callback in callbacks {
            callback();
        }

        let children: Vec<Arc<Inner>> = {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.iter().filter_map(Weak::upgrade).collect()
        };
        for inner in children {
            CancellationToken { inner }.cancel_with_reason(CancellationReason::ParentCancelled);
        }
    }

    /// Check if this token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason, `None` while not cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.lock().clone()
    }

    /// Registers a callback to run once when the token is cancelled
    ///
    /// If the token is already cancelled the callback runs immediately on
    /// the calling thread.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.inner.callbacks.lock();
            if !self.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }

    #[test]
    fn test_cancel_reason_first_wins() {
        let token = CancellationToken::new();
        token.cancel_with_reason(CancellationReason::PoolClosed);
        token.cancel_with_reason(CancellationReason::Custom("later".into()));

        assert_eq!(token.reason(), Some(CancellationReason::PoolClosed));
    }

    #[test]
    fn test_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_cancelled_by_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(child.reason(), Some(CancellationReason::ParentCancelled));
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();

        child.cancel();

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_of_cancelled_parent() {
        let parent = CancellationToken::new();
        parent.cancel();

        let child = parent.child();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_dropped_children_are_pruned() {
        let parent = CancellationToken::new();
        for _ in 0..100 {
            drop(parent.child());
        }
        let live = parent.child();

        assert_eq!(parent.inner.children.lock().len(), 1);

        parent.cancel();
        assert!(live.is_cancelled());
    }

    #[test]
    fn test_on_cancel_runs_once() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        token.on_cancel(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        token.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cancel_after_cancelled_runs_inline() {
        let token = CancellationToken::new();
        token.cancel();

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = Arc::clone(&called);
        token.on_cancel(move || called_clone.store(true, Ordering::SeqCst));

        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_on_cancel_concurrent_registration() {
        for _ in 0..50 {
            let token = CancellationToken::new();
            let calls = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let token = token.clone();
                    let calls = Arc::clone(&calls);
                    thread::spawn(move || {
                        token.on_cancel(move || {
                            calls.fetch_add(1, Ordering::SeqCst);
                        });
                    })
                })
                .collect();

            token.cancel();
            for handle in handles {
                handle.join().expect("registration thread panicked");
            }

            assert_eq!(calls.load(Ordering::SeqCst), 4);
        }
    }
}
