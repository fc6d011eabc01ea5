//! Convenient re-exports for common types and traits

pub use crate::core::{
    CancellationReason, CancellationToken, LogHandler, MessageHandler, PoolError, Result,
};
pub use crate::pool::{PoolStats, WorkerPool, WorkerPoolConfig};
