//! Resizable worker pool implementation

use crate::core::{
    CancellationReason, CancellationToken, CompletionTracker, LogHandler, MessageHandler,
    PoolError, Result,
};
use crate::pool::stats::{PoolCounters, PoolStats};
use crate::pool::worker::{RemovalToken, Worker, WorkerContext, WorkerCounts};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Configuration for a worker pool
#[derive(Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers spawned by [`WorkerPool::with_config`]
    pub initial_workers: usize,
    /// Thread name prefix; threads are named `{prefix}-{id}`
    pub thread_name_prefix: String,
    /// Stack size for worker threads (`None` = platform default)
    pub stack_size: Option<usize>,
    handler: Arc<dyn MessageHandler>,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for WorkerPoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolConfig")
            .field("initial_workers", &self.initial_workers)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field("handler", &self.handler.name())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: 0,
            thread_name_prefix: "pool-worker".to_string(),
            stack_size: None,
            handler: Arc::new(LogHandler),
            cancellation: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration that starts with `initial_workers` workers
    #[must_use]
    pub fn new(initial_workers: usize) -> Self {
        Self {
            initial_workers,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Set the handler every worker runs for each message
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_handler<H: MessageHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Set an already shared handler
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_shared_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Attach the pool to an external cancellation scope
    ///
    /// The pool derives a child token, so cancelling `parent` shuts the pool
    /// down while closing the pool leaves `parent` untouched.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.cancellation = Some(parent);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        if self.stack_size == Some(0) {
            return Err(PoolError::invalid_config(
                "stack_size",
                "Stack size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Sending and receiving ends of the pool's control queues
struct Queues {
    work_tx: Sender<String>,
    work_rx: Receiver<String>,
    removal_tx: Sender<RemovalToken>,
    removal_rx: Receiver<RemovalToken>,
    shutdown_rx: Receiver<()>,
}

/// A pool of worker threads that can grow and shrink while running
///
/// # Dispatch
///
/// Messages and removal tokens travel over zero-capacity channels shared by
/// every worker, so each send rendezvous with exactly one idle worker. Which
/// worker that is depends on scheduling.
///
/// # Shutdown
///
/// [`close`](Self::close) cancels the pool's token, which every worker
/// (including one spawned concurrently) observes. It then waits until every
/// registered worker has confirmed termination.
///
/// # Example
///
/// ```rust
/// use resizable_worker_pool::prelude::*;
///
/// # fn main() -> Result<()> {
/// let pool = WorkerPool::new();
/// pool.add_workers(4)?;
///
/// pool.add_message("hello")?;
///
/// pool.delete_workers(2)?;
/// assert_eq!(pool.worker_count(), 2);
///
/// pool.close()?;
/// assert_eq!(pool.worker_count(), 0);
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queues: RwLock<Option<Queues>>,
    workers: Mutex<Vec<Worker>>,
    next_id: AtomicUsize,
    counts: Arc<WorkerCounts>,
    counters: Arc<PoolCounters>,
    tracker: CompletionTracker,
    cancellation: CancellationToken,
    closed: AtomicBool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("workers", &self.worker_count())
            .field("busy", &self.busy_worker_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    /// Create an empty pool with default configuration
    pub fn new() -> Self {
        Self::build(WorkerPoolConfig::default())
    }

    /// Create an empty pool that shuts down when `parent` is cancelled
    pub fn with_cancellation(parent: CancellationToken) -> Self {
        Self::build(WorkerPoolConfig::default().with_cancellation(parent))
    }

    /// Create a pool from a configuration and spawn its initial workers
    pub fn with_config(config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let initial = config.initial_workers;

        let pool = Self::build(config);
        pool.add_workers(initial)?;
        Ok(pool)
    }

    fn build(config: WorkerPoolConfig) -> Self {
        let cancellation = match &config.cancellation {
            Some(parent) => parent.child(),
            None => CancellationToken::new(),
        };

        let (work_tx, work_rx) = bounded(0);
        let (removal_tx, removal_rx) = bounded(0);
        // Never sent on; dropping the sender wakes every select! at once.
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        cancellation.on_cancel(move || drop(shutdown_tx));

        Self {
            config,
            queues: RwLock::new(Some(Queues {
                work_tx,
                work_rx,
                removal_tx,
                removal_rx,
                shutdown_rx,
            })),
            workers: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            counts: Arc::new(WorkerCounts::default()),
            counters: Arc::new(PoolCounters::new()),
            tracker: CompletionTracker::new(),
            cancellation,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) || self.cancellation.is_cancelled() {
            return Err(PoolError::PoolClosed);
        }
        Ok(())
    }

    fn thread_builder(&self, id: usize) -> thread::Builder {
        let builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, id));
        match self.config.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }

    /// Join threads of workers that already exited
    fn reap_finished(workers: &mut Vec<Worker>) {
        let (finished, running): (Vec<_>, Vec<_>) =
            workers.drain(..).partition(Worker::is_finished);
        *workers = running;
        for worker in finished {
            let id = worker.id();
            if let Err(e) = worker.join() {
                log::error!("failed to join worker {}: {}", id, e);
            }
        }
    }

    /// Spawn `count` new workers
    ///
    /// Each worker is counted and registered for shutdown tracking before its
    /// thread starts. Zero is a no-op.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` - the pool is closed or its cancellation fired;
    ///   nothing is spawned
    /// - `PoolError::SpawnError` - the OS refused a thread; workers spawned
    ///   before the failure keep running
    pub fn add_workers(&self, count: usize) -> Result<()> {
        self.ensure_open()?;

        // Held while registering so `close` cannot miss a new worker.
        let queues_guard = self.queues.read();
        let queues = queues_guard.as_ref().ok_or(PoolError::PoolClosed)?;
        if count == 0 {
            return Ok(());
        }

        let mut workers = self.workers.lock();
        Self::reap_finished(&mut workers);

        for _ in 0..count {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.tracker.register();
            self.counts.increment();

            let ctx = WorkerContext {
                work_items: queues.work_rx.clone(),
                removal_tokens: queues.removal_rx.clone(),
                shutdown: queues.shutdown_rx.clone(),
                cancellation: self.cancellation.clone(),
                tracker: self.tracker.clone(),
                counts: Arc::clone(&self.counts),
                counters: Arc::clone(&self.counters),
                handler: Arc::clone(&self.config.handler),
            };

            match Worker::spawn(id, self.thread_builder(id), ctx) {
                Ok(worker) => {
                    self.counters.record_spawned();
                    #[cfg(feature = "tracing")]
                    crate::telemetry::metrics::record_worker_spawned(id);
                    workers.push(worker);
                }
                Err(e) => {
                    self.counts.decrement(false);
                    self.tracker.done();
                    log::error!("{}", e);
                    return Err(e);
                }
            }
        }

        log::info!("added {} workers ({} alive)", count, self.counts.live());
        Ok(())
    }

    /// Remove `count` idle workers
    ///
    /// Sends one removal token per worker; each send waits until some idle
    /// worker accepts it. Returns once every removed worker has left the
    /// live count. Which workers go is unspecified.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` - the pool is closed, or shut down while
    ///   tokens were still being delivered
    /// - `PoolError::InvalidCount` - `count` exceeds the workers not already
    ///   promised to another removal; nothing is sent
    pub fn delete_workers(&self, count: usize) -> Result<()> {
        self.ensure_open()?;

        let (removal_tx, shutdown_rx) = {
            let queues = self.queues.read();
            let queues = queues.as_ref().ok_or(PoolError::PoolClosed)?;
            (queues.removal_tx.clone(), queues.shutdown_rx.clone())
        };

        self.counts.reserve(count)?;
        if count == 0 {
            return Ok(());
        }

        let (ack_tx, ack_rx) = unbounded();
        for sent in 0..count {
            let delivered = select! {
                send(removal_tx, RemovalToken::new(ack_tx.clone())) -> res => res.is_ok(),
                recv(shutdown_rx) -> _ => false,
            };
            if !delivered {
                self.counts.release(count - sent);
                log::warn!(
                    "removal interrupted by shutdown after {} of {} workers",
                    sent,
                    count
                );
                return Err(PoolError::PoolClosed);
            }
        }
        drop(ack_tx);

        let mut removed = Vec::with_capacity(count);
        while removed.len() < count {
            match ack_rx.recv() {
                Ok(id) => removed.push(id),
                Err(_) => break,
            }
        }

        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_workers_removed(&removed);
        log::info!("removed workers {:?} ({} alive)", removed, self.counts.live());
        Ok(())
    }

    /// Hand a message to exactly one idle worker
    ///
    /// Blocks until a worker accepts it. With every worker busy this is the
    /// pool's backpressure; with workers that never become idle it blocks
    /// until the pool shuts down.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` - the pool is closed or shuts down while
    ///   waiting
    /// - `PoolError::NoWorkers` - the pool has no workers; returns without
    ///   blocking
    pub fn add_message(&self, payload: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        if self.counts.live() == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (work_tx, shutdown_rx) = {
            let queues = self.queues.read();
            let queues = queues.as_ref().ok_or(PoolError::PoolClosed)?;
            (queues.work_tx.clone(), queues.shutdown_rx.clone())
        };

        let payload = payload.into();
        select! {
            send(work_tx, payload) -> res => res.map_err(|_| PoolError::PoolClosed)?,
            recv(shutdown_rx) -> _ => return Err(PoolError::PoolClosed),
        }

        self.counters.record_sent();
        Ok(())
    }

    /// Shut the pool down and wait for every worker to exit
    ///
    /// 1. Marks the pool closed and cancels its token
    /// 2. Waits for in-progress `add_workers` calls to finish registering
    /// 3. Waits until every worker has confirmed termination
    /// 4. Releases the queues and joins the worker threads
    ///
    /// # Errors
    ///
    /// - `PoolError::AlreadyClosed` - `close` was already called
    pub fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PoolError::AlreadyClosed);
        }

        self.cancellation.cancel_with_reason(CancellationReason::PoolClosed);

        let queues = self.queues.write().take();
        self.tracker.wait();
        drop(queues);

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                log::error!("failed to join worker {}: {}", id, e);
            }
        }

        let stats = self.stats();
        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_pool_close(&stats);
        log::info!(
            "worker pool closed: {} spawned, {} messages handled, {} failed, {} panicked",
            stats.spawned,
            stats.messages_handled,
            stats.messages_failed,
            stats.messages_panicked
        );
        Ok(())
    }

    /// Number of workers not yet confirmed terminated (advisory snapshot)
    pub fn worker_count(&self) -> usize {
        self.counts.live()
    }

    /// Number of workers currently running a handler (advisory snapshot)
    pub fn busy_worker_count(&self) -> usize {
        self.counters.busy()
    }

    /// Check if `close` has been called
    ///
    /// External cancellation stops the pool without setting this flag, so
    /// `close` can still run. [`stats`](Self::stats) reports either as closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The pool's own cancellation token
    ///
    /// Cancelling it stops every worker without marking the pool closed; a
    /// later [`close`](Self::close) still succeeds and returns promptly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Snapshot of pool statistics
    ///
    /// `closed` is set once the pool accepts no more work, whether through
    /// `close` or a fired cancellation token.
    pub fn stats(&self) -> PoolStats {
        let closed = self.is_closed() || self.cancellation.is_cancelled();
        self.counters.snapshot(self.worker_count(), closed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.close() {
                log::error!("failed to close worker pool during drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[test]
    fn test_pool_creation() {
        let pool = WorkerPool::new();
        assert_eq!(pool.worker_count(), 0);
        assert_eq!(pool.busy_worker_count(), 0);
        assert!(!pool.is_closed());

        pool.close().expect("Failed to close pool");
        assert!(pool.is_closed());
    }

    #[test]
    fn test_with_config_spawns_initial_workers() {
        let config = WorkerPoolConfig::new(3).with_thread_name_prefix("test-worker");
        let pool = WorkerPool::with_config(config).expect("Failed to create pool");
        assert_eq!(pool.worker_count(), 3);
        assert_eq!(pool.stats().spawned, 3);
    }

    #[test]
    fn test_config_validation() {
        let config = WorkerPoolConfig::new(1).with_thread_name_prefix("");
        assert!(matches!(
            WorkerPool::with_config(config),
            Err(PoolError::InvalidConfig { .. })
        ));

        let config = WorkerPoolConfig::new(1).with_stack_size(0);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_worker_ids_are_sequential() {
        let pool = WorkerPool::new();
        pool.add_workers(2).expect("Failed to add workers");
        pool.add_workers(3).expect("Failed to add workers");

        let ids: Vec<usize> = pool.workers.lock().iter().map(Worker::id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_add_zero_workers() {
        let pool = WorkerPool::new();
        pool.add_workers(0).expect("adding zero workers should succeed");
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_delete_workers() {
        let pool = WorkerPool::new();
        pool.add_workers(5).expect("Failed to add workers");

        pool.delete_workers(2).expect("Failed to delete workers");
        assert_eq!(pool.worker_count(), 3);

        pool.delete_workers(0).expect("deleting zero workers should succeed");
        assert_eq!(pool.worker_count(), 3);
    }

    #[test]
    fn test_delete_too_many_workers() {
        let pool = WorkerPool::new();
        pool.add_workers(2).expect("Failed to add workers");

        let result = pool.delete_workers(3);
        assert!(matches!(
            result,
            Err(PoolError::InvalidCount {
                requested: 3,
                available: 2
            })
        ));
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_message_handled_once() {
        let handled = Arc::new(AtomicUsize::new(0));
        let handled_clone = Arc::clone(&handled);
        let config = WorkerPoolConfig::new(2).with_handler(move |_: usize, _: &str| -> Result<()> {
            handled_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let pool = WorkerPool::with_config(config).expect("Failed to create pool");

        for i in 0..10 {
            pool.add_message(format!("message {}", i)).expect("Failed to send message");
        }

        assert!(wait_until(|| handled.load(Ordering::SeqCst) == 10));
        assert_eq!(pool.stats().messages_sent, 10);
    }

    #[test]
    fn test_message_without_workers() {
        let pool = WorkerPool::new();
        assert!(matches!(pool.add_message("x"), Err(PoolError::NoWorkers)));
    }

    #[test]
    fn test_busy_count_while_handling() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let config = WorkerPoolConfig::new(1).with_handler(move |_: usize, _: &str| -> Result<()> {
            let _ = release_rx.recv();
            Ok(())
        });
        let pool = WorkerPool::with_config(config).expect("Failed to create pool");

        pool.add_message("block").expect("Failed to send message");
        assert!(wait_until(|| pool.busy_worker_count() == 1));

        release_tx.send(()).expect("release handler");
        assert!(wait_until(|| pool.busy_worker_count() == 0));
    }

    #[test]
    fn test_handler_failure_is_counted() {
        let config = WorkerPoolConfig::new(1).with_handler(|id: usize, _: &str| -> Result<()> {
            Err(PoolError::handler(id, "always fails"))
        });
        let pool = WorkerPool::with_config(config).expect("Failed to create pool");

        pool.add_message("x").expect("Failed to send message");
        assert!(wait_until(|| pool.stats().messages_failed == 1));

        // The worker keeps serving after a failure.
        pool.add_message("y").expect("Failed to send message");
        assert!(wait_until(|| pool.stats().messages_failed == 2));
    }

    #[test]
    fn test_operations_after_close() {
        let pool = WorkerPool::new();
        pool.add_workers(2).expect("Failed to add workers");
        pool.close().expect("Failed to close pool");

        assert_eq!(pool.worker_count(), 0);
        assert!(matches!(pool.add_workers(1), Err(PoolError::PoolClosed)));
        assert!(matches!(pool.delete_workers(1), Err(PoolError::PoolClosed)));
        assert!(matches!(pool.add_message("x"), Err(PoolError::PoolClosed)));
        assert!(matches!(pool.close(), Err(PoolError::AlreadyClosed)));
        assert!(pool.stats().closed);
    }

    #[test]
    fn test_close_reaps_worker_threads() {
        let pool = WorkerPool::new();
        pool.add_workers(4).expect("Failed to add workers");
        pool.delete_workers(1).expect("Failed to delete workers");
        pool.close().expect("Failed to close pool");

        assert!(pool.workers.lock().is_empty());
        assert_eq!(pool.tracker.outstanding(), 0);
        assert_eq!(pool.stats().terminated, 4);
    }

    #[test]
    fn test_message_blocked_until_close() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let config = WorkerPoolConfig::new(1).with_handler(move |_: usize, _: &str| -> Result<()> {
            let _ = release_rx.recv();
            Ok(())
        });
        let pool = Arc::new(WorkerPool::with_config(config).expect("Failed to create pool"));
        pool.add_message("occupy").expect("Failed to send message");

        let sender = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.add_message("waiting"))
        };
        thread::sleep(Duration::from_millis(50));

        pool.cancellation_token().cancel();
        drop(release_tx);

        let result = sender.join().expect("sender thread panicked");
        assert!(matches!(result, Err(PoolError::PoolClosed)));
        pool.close().expect("Failed to close pool");
    }

    #[test]
    fn test_stats_report_closed_after_cancellation() {
        let token = CancellationToken::new();
        let pool = WorkerPool::with_cancellation(token.clone());
        pool.add_workers(1).expect("Failed to add workers");

        token.cancel();

        assert!(matches!(pool.add_message("late"), Err(PoolError::PoolClosed)));
        assert!(!pool.is_closed());
        assert!(pool.stats().closed);

        pool.close().expect("Failed to close pool");
        assert!(pool.is_closed());
    }

    #[test]
    fn test_drop_closes_pool() {
        let token = CancellationToken::new();
        let pool = WorkerPool::with_cancellation(token.clone());
        pool.add_workers(2).expect("Failed to add workers");
        let inner = pool.cancellation_token();

        drop(pool);

        assert!(inner.is_cancelled());
        assert_eq!(inner.reason(), Some(CancellationReason::PoolClosed));
        assert!(!token.is_cancelled());
    }
}
