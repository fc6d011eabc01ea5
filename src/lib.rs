//! # Resizable Worker Pool
//!
//! A process-local pool of worker threads that can be grown and shrunk while
//! it runs, with cancellation-based graceful shutdown.
//!
//! ## Features
//!
//! - **Rendezvous dispatch**: each message is handed to exactly one idle
//!   worker; senders block until one is free, which is the pool's backpressure
//! - **Live resizing**: `add_workers` / `delete_workers` at any time, from any
//!   thread
//! - **Graceful shutdown**: `close` waits for every worker to confirm exit
//! - **Cancellation scopes**: a pool can hang off an external
//!   [`CancellationToken`] and stop with it
//! - **Pluggable handlers**: any [`MessageHandler`] or closure processes the
//!   payloads
//!
//! ## Quick Start
//!
//! ```rust
//! use resizable_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::new();
//! pool.add_workers(4)?;
//!
//! for i in 0..10 {
//!     pool.add_message(format!("message {}", i))?;
//! }
//!
//! pool.delete_workers(3)?;
//! assert_eq!(pool.worker_count(), 1);
//!
//! pool.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Handlers
//!
//! ```rust
//! use resizable_worker_pool::prelude::*;
//!
//! struct Uppercase;
//!
//! impl MessageHandler for Uppercase {
//!     fn handle(&self, worker_id: usize, message: &str) -> Result<()> {
//!         println!("[{}] {}", worker_id, message.to_uppercase());
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let config = WorkerPoolConfig::new(2)
//!     .with_thread_name_prefix("upper")
//!     .with_handler(Uppercase);
//!
//! let pool = WorkerPool::with_config(config)?;
//! pool.add_message("shout")?;
//! # pool.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## External Cancellation
//!
//! ```rust
//! use resizable_worker_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let app_shutdown = CancellationToken::new();
//! let pool = WorkerPool::with_cancellation(app_shutdown.clone());
//! pool.add_workers(3)?;
//!
//! app_shutdown.cancel();
//! assert!(matches!(pool.add_workers(1), Err(PoolError::PoolClosed)));
//!
//! pool.close()?;
//! assert_eq!(pool.worker_count(), 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
#[cfg(feature = "tracing")]
pub mod telemetry;

pub use crate::core::{
    CancellationReason, CancellationToken, LogHandler, MessageHandler, PoolError, Result,
};
pub use crate::pool::{PoolStats, WorkerPool, WorkerPoolConfig};
