//! Worker pool and worker implementations

pub mod stats;
pub mod worker;
pub mod worker_pool;

pub use stats::PoolStats;
pub use worker::{ExitReason, Worker};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
