//! Worker thread implementation

use crate::core::{CancellationToken, CompletionTracker, MessageHandler, PoolError, Result};
use crate::pool::stats::PoolCounters;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Permit that makes exactly one idle worker terminate
///
/// The worker acknowledges the token with its id once it has left the live
/// count, so the sender can wait for exactly the removals it asked for.
#[derive(Debug)]
pub(crate) struct RemovalToken {
    ack: Sender<usize>,
}

impl RemovalToken {
    pub(crate) fn new(ack: Sender<usize>) -> Self {
        Self { ack }
    }
}

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown signal observed
    Shutdown,
    /// Consumed a removal token
    Removed,
    /// A control queue was released underneath the worker
    QueueClosed,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Shutdown => write!(f, "shutdown"),
            ExitReason::Removed => write!(f, "removed"),
            ExitReason::QueueClosed => write!(f, "queue closed"),
        }
    }
}

#[derive(Debug, Default)]
struct CountState {
    live: usize,
    reserved: usize,
}

/// Guarded live-worker count plus removals already promised to callers
#[derive(Debug, Default)]
pub(crate) struct WorkerCounts {
    state: Mutex<CountState>,
}

impl WorkerCounts {
    pub(crate) fn live(&self) -> usize {
        self.state.lock().live
    }

    pub(crate) fn increment(&self) {
        self.state.lock().live += 1;
    }

    /// Remove one worker; `removed` releases one reservation as well
    pub(crate) fn decrement(&self, removed: bool) {
        let mut state = self.state.lock();
        debug_assert!(state.live > 0, "worker count underflow");
        state.live = state.live.saturating_sub(1);
        if removed {
            state.reserved = state.reserved.saturating_sub(1);
        }
    }

    /// Reserve `count` workers for removal, or reject without mutating
    pub(crate) fn reserve(&self, count: usize) -> Result<()> {
        let mut state = self.state.lock();
        let available = state.live.saturating_sub(state.reserved);
        if count > available {
            return Err(PoolError::invalid_count(count, available));
        }
        state.reserved += count;
        Ok(())
    }

    /// Give back reservations whose tokens were never delivered
    pub(crate) fn release(&self, count: usize) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(count);
    }
}

/// Everything a worker borrows from its pool
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) work_items: Receiver<String>,
    pub(crate) removal_tokens: Receiver<RemovalToken>,
    /// Disconnected once the pool's cancellation token fires
    pub(crate) shutdown: Receiver<()>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) tracker: CompletionTracker,
    pub(crate) counts: Arc<WorkerCounts>,
    pub(crate) counters: Arc<PoolCounters>,
    pub(crate) handler: Arc<dyn MessageHandler>,
}

/// Handle to a spawned worker thread
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker thread
    ///
    /// The caller must already have registered the worker with the
    /// completion tracker and the live count; the thread releases both on
    /// exit. If spawning fails nothing is released here.
    pub(crate) fn spawn(id: usize, builder: thread::Builder, ctx: WorkerContext) -> Result<Self> {
        let thread = builder
            .spawn(move || Self::run(id, ctx))
            .map_err(|e| PoolError::spawn_with_source(id, "thread spawn failed", e))?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Join the worker thread
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| PoolError::worker_panic(self.id, "worker thread panicked"))?;
        }
        Ok(())
    }

    /// Main worker loop
    fn run(id: usize, ctx: WorkerContext) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _span_guard = worker_span.enter();

        log::debug!("worker {} started", id);

        let mut exit = ExitGuard {
            id,
            ctx: &ctx,
            reason: ExitReason::Shutdown,
            token: None,
        };

        loop {
            // A worker born after shutdown must not pick up work first.
            if ctx.cancellation.is_cancelled() {
                exit.reason = ExitReason::Shutdown;
                break;
            }

            select! {
                recv(ctx.shutdown) -> _ => {
                    exit.reason = ExitReason::Shutdown;
                    break;
                }
                recv(ctx.removal_tokens) -> token => {
                    match token {
                        Ok(token) => {
                            exit.reason = ExitReason::Removed;
                            exit.token = Some(token);
                        }
                        Err(_) => exit.reason = ExitReason::QueueClosed,
                    }
                    break;
                }
                recv(ctx.work_items) -> message => match message {
                    Ok(message) => Self::process(id, &ctx, &message),
                    Err(_) => {
                        exit.reason = ExitReason::QueueClosed;
                        break;
                    }
                },
            }
        }
    }

    /// Run the handler for one message with panic protection
    fn process(id: usize, ctx: &WorkerContext, message: &str) {
        ctx.counters.set_busy();
        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_worker_busy(id);

        let outcome = catch_unwind(AssertUnwindSafe(|| ctx.handler.handle(id, message)));

        match outcome {
            Ok(Ok(())) => ctx.counters.record_handled(),
            Ok(Err(e)) => {
                log::warn!("worker {}: handler {} failed: {}", id, ctx.handler.name(), e);
                ctx.counters.record_failed();
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                log::error!("worker {}: handler panicked: {}", id, panic_msg);
                ctx.counters.record_panicked();
            }
        }

        ctx.counters.set_idle();
        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_worker_idle(id);
    }
}

/// Releases a worker's pool registrations exactly once, however the loop ends
struct ExitGuard<'a> {
    id: usize,
    ctx: &'a WorkerContext,
    reason: ExitReason,
    token: Option<RemovalToken>,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let removed = self.token.is_some();
        self.ctx.counts.decrement(removed);
        self.ctx.counters.record_terminated();

        if let Some(token) = self.token.take() {
            // The remover may have given up on a closed pool.
            let _ = token.ack.send(self.id);
        }

        log::debug!("worker {} exited ({})", self.id, self.reason);
        #[cfg(feature = "tracing")]
        crate::telemetry::metrics::record_worker_exit(self.id, self.reason);

        self.ctx.tracker.done();
    }
}
