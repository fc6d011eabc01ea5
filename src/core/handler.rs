//! Message handler trait and the default log handler

use crate::core::error::Result;
use std::fmt;

/// Processes a single message on a worker thread
///
/// Exactly one worker calls `handle` for each accepted message and finishes
/// it before waiting for its next event. Returned errors are logged and
/// counted by the worker; they never reach the sender.
pub trait MessageHandler: Send + Sync {
    /// Handle one message
    ///
    /// # Errors
    ///
    /// Returns an error if processing fails
    fn handle(&self, worker_id: usize, message: &str) -> Result<()>;

    /// Handler name for logs and debugging
    fn name(&self) -> &str {
        "MessageHandler"
    }
}

impl fmt::Debug for dyn MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHandler({})", self.name())
    }
}

impl<F> MessageHandler for F
where
    F: Fn(usize, &str) -> Result<()> + Send + Sync,
{
    fn handle(&self, worker_id: usize, message: &str) -> Result<()> {
        self(worker_id, message)
    }

    fn name(&self) -> &str {
        "FnHandler"
    }
}

/// Renders each message through the `log` facade at `info` level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle(&self, worker_id: usize, message: &str) -> Result<()> {
        log::info!("worker {}: {}", worker_id, message);
        Ok(())
    }

    fn name(&self) -> &str {
        "LogHandler"
    }
}
