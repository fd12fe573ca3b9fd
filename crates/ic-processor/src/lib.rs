//! Item Batch Processor
//!
//! This crate provides the concurrent batch-processing core:
//! - WorkerPool: fixed-capacity, process-wide gate for batch tasks
//! - BatchProcessor: fans one task per item out over the pool and aggregates outcomes
//! - BatchReport / TaskOutcome: per-task results combined after join

pub mod error;
pub mod metrics;
pub mod pool;
pub mod processor;
pub mod report;

pub use error::{BatchError, PoolError, TaskFailure};
pub use pool::{WorkerPool, DEFAULT_POOL_CAPACITY};
pub use processor::{BatchProcessor, BatchSettings};
pub use report::{BatchReport, SkipReason, TaskOutcome};

// Shutdown signal observed during the processing pause
pub use tokio_util::sync::CancellationToken;
