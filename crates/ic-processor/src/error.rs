//! Processor error types

use ic_common::{Item, ItemId};
use ic_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool {pool} is closed")]
    Closed { pool: String },
}

/// Why a single item's task did not complete
#[derive(Error, Debug)]
pub enum TaskFailure {
    #[error("Failed to process item {id}: {source}")]
    Store {
        id: ItemId,
        #[source]
        source: StoreError,
    },

    #[error("Cancelled while processing item {id}")]
    Cancelled { id: ItemId },

    #[error("Task for item {id} panicked: {message}")]
    Panicked { id: ItemId, message: String },

    #[error("Worker pool closed before item {id} could run")]
    PoolClosed { id: ItemId },
}

impl TaskFailure {
    pub fn item_id(&self) -> ItemId {
        match self {
            TaskFailure::Store { id, .. }
            | TaskFailure::Cancelled { id }
            | TaskFailure::Panicked { id, .. }
            | TaskFailure::PoolClosed { id } => *id,
        }
    }

    /// Stable machine-readable kind, used in API payloads and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            TaskFailure::Store { .. } => "STORE",
            TaskFailure::Cancelled { .. } => "CANCELLED",
            TaskFailure::Panicked { .. } => "PANICKED",
            TaskFailure::PoolClosed { .. } => "POOL_CLOSED",
        }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    /// Listing ids failed; no task was dispatched
    #[error("Failed to snapshot item ids: {0}")]
    Snapshot(#[source] StoreError),

    /// At least one task failed. Items in `processed` were persisted anyway.
    #[error("Batch processing failed: {} task(s) failed", .failures.len())]
    TasksFailed {
        failures: Vec<TaskFailure>,
        processed: Vec<Item>,
        skipped: usize,
    },
}

impl BatchError {
    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            BatchError::Snapshot(_) => &[],
            BatchError::TasksFailed { failures, .. } => failures,
        }
    }

    pub fn processed(&self) -> &[Item] {
        match self {
            BatchError::Snapshot(_) => &[],
            BatchError::TasksFailed { processed, .. } => processed,
        }
    }
}
