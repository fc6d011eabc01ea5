//! Core types shared by the pool and its workers

pub mod cancellation;
pub mod error;
pub mod handler;
pub mod tracker;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{PoolError, Result};
pub use handler::{LogHandler, MessageHandler};
pub use tracker::CompletionTracker;
