use std::time::Duration;

use ic_common::{Item, ItemId};
use uuid::Uuid;

use crate::error::{BatchError, TaskFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Deleted between the id snapshot and the lookup
    Missing,
    /// Already `processed`, possibly by a concurrent run
    AlreadyProcessed,
}

/// What one task produced
#[derive(Debug)]
pub enum TaskOutcome {
    Processed(Item),
    Skipped { id: ItemId, reason: SkipReason },
    Failed(TaskFailure),
}

/// Combined outcome of one batch run
#[derive(Debug)]
pub struct BatchReport {
    pub run_id: Uuid,
    /// Size of the id snapshot
    pub total: usize,
    /// Newly processed items, in snapshot order
    pub processed: Vec<Item>,
    pub skipped_missing: usize,
    pub skipped_already_processed: usize,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            total,
            processed: Vec::new(),
            skipped_missing: 0,
            skipped_already_processed: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Processed(item) => self.processed.push(item),
            TaskOutcome::Skipped { reason: SkipReason::Missing, .. } => self.skipped_missing += 1,
            TaskOutcome::Skipped { reason: SkipReason::AlreadyProcessed, .. } => {
                self.skipped_already_processed += 1
            }
            TaskOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_missing + self.skipped_already_processed
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// All-or-nothing view: any failure fails the whole run
    pub fn into_result(self) -> Result<Vec<Item>, BatchError> {
        if self.failures.is_empty() {
            return Ok(self.processed);
        }
        let skipped = self.skipped();
        Err(BatchError::TasksFailed {
            failures: self.failures,
            processed: self.processed,
            skipped,
        })
    }
}
