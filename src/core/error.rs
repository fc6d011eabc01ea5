//! Error types for the worker pool

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the worker pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Operation attempted after `close` or while shutdown is in progress
    #[error("Worker pool is closed")]
    PoolClosed,

    /// `close` was called more than once
    #[error("Worker pool is already closed")]
    AlreadyClosed,

    /// Removal count exceeds the workers available for removal
    #[error("Cannot remove {requested} workers: only {available} available")]
    InvalidCount {
        /// Number of workers the caller asked to remove
        requested: usize,
        /// Number of workers that could be removed at validation time
        available: usize,
    },

    /// Message sent while the pool has no workers
    #[error("Worker pool has no workers to receive the message")]
    NoWorkers,

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker #{worker_id}: {message}")]
    SpawnError {
        /// ID that was assigned to the worker
        worker_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// A worker thread panicked outside its handler
    #[error("Worker #{worker_id} panicked: {message}")]
    WorkerPanic {
        /// ID of the panicked worker
        worker_id: usize,
        /// Panic message
        message: String,
    },

    /// A message handler reported a failure
    #[error("Handler failed on worker #{worker_id}: {message}")]
    Handler {
        /// Worker that ran the handler
        worker_id: usize,
        /// Error message
        message: String,
    },
}

impl PoolError {
    /// Create an invalid count error
    pub fn invalid_count(requested: usize, available: usize) -> Self {
        PoolError::InvalidCount {
            requested,
            available,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        worker_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PoolError::SpawnError {
            worker_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a handler error
    pub fn handler(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::Handler {
            worker_id,
            message: message.into(),
        }
    }

    /// Create a worker panic error
    pub fn worker_panic(worker_id: usize, message: impl Into<String>) -> Self {
        PoolError::WorkerPanic {
            worker_id,
            message: message.into(),
        }
    }

    /// Whether the error means the pool will never accept work again
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::PoolClosed | PoolError::AlreadyClosed)
    }
}
