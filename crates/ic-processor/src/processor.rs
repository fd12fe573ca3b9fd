//! BatchProcessor - marks every unprocessed item as processed
//!
//! One run:
//! 1. Snapshot all ids from the store
//! 2. Spawn one task per id on the shared worker pool. Each task pauses
//!    (cancellation-aware), re-reads its item, skips missing or already
//!    processed items, otherwise flips the status and saves it.
//! 3. Join every task and fold the per-task outcomes into a `BatchReport`
//!
//! Tasks never share a result collection; each returns a `TaskOutcome` and the
//! coordinator combines them after the join, in snapshot order.
//!
//! If the coordinating future is dropped (caller timeout), spawned tasks keep
//! running to completion; only the wait is abandoned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use ic_common::{Item, ItemId};
use ic_store::ItemStore;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{BatchError, PoolError, TaskFailure};
use crate::metrics;
use crate::pool::WorkerPool;
use crate::report::{BatchReport, SkipReason, TaskOutcome};

/// Per-item simulated processing cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub processing_delay: Duration,
    /// Upper bound of a uniform random extra delay
    pub jitter: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(100),
            jitter: Duration::ZERO,
        }
    }
}

impl BatchSettings {
    pub fn with_delay(processing_delay: Duration) -> Self {
        Self {
            processing_delay,
            jitter: Duration::ZERO,
        }
    }

    fn pause_for_task(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.processing_delay;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.processing_delay + Duration::from_millis(extra_ms)
    }
}

pub struct BatchProcessor {
    store: Arc<dyn ItemStore>,
    pool: Arc<WorkerPool>,
    settings: BatchSettings,
    cancellation: CancellationToken,
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn ItemStore>, pool: Arc<WorkerPool>, settings: BatchSettings) -> Self {
        Self {
            store,
            pool,
            settings,
            // Nobody else holds this token, so it never fires
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach the process-wide shutdown signal
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Run a batch and return only the newly processed items.
    ///
    /// Fails if any task failed, even though the items listed in
    /// `BatchError::TasksFailed::processed` were persisted.
    pub async fn process_all(&self) -> Result<Vec<Item>, BatchError> {
        self.process_all_report().await?.into_result()
    }

    /// Run a batch and return the full report. Only a failed id snapshot is
    /// an `Err` here; task failures are listed in the report.
    pub async fn process_all_report(&self) -> Result<BatchReport, BatchError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch_run", %run_id, pool = %self.pool.name());
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> Result<BatchReport, BatchError> {
        let started = Instant::now();

        let ids = self.store.find_all_ids().await.map_err(|e| {
            warn!(error = %e, "Failed to list item ids");
            metrics::record_snapshot_failure();
            BatchError::Snapshot(e)
        })?;

        info!(items = ids.len(), capacity = self.pool.capacity(), "Dispatching batch tasks");

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = self.store.clone();
                let cancellation = self.cancellation.clone();
                let pause = self.settings.pause_for_task();
                let task = process_item(store, id, pause, cancellation)
                    .instrument(info_span!("batch_task", item_id = id));
                (id, self.pool.spawn(task))
            })
            .collect();

        let joined = join_all(
            handles
                .into_iter()
                .map(|(id, handle)| async move { (id, handle.await) }),
        )
        .await;

        let mut report = BatchReport::new(run_id, ids.len());
        for (id, joined) in joined {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(PoolError::Closed { .. })) => TaskOutcome::Failed(TaskFailure::PoolClosed { id }),
                Err(e) => TaskOutcome::Failed(TaskFailure::Panicked {
                    id,
                    message: e.to_string(),
                }),
            };
            if let TaskOutcome::Failed(ref failure) = outcome {
                warn!(item_id = id, kind = failure.kind(), error = %failure, "Batch task failed");
            }
            report.record(outcome);
        }
        report.elapsed = started.elapsed();

        metrics::record_run(&report);

        if report.is_success() {
            info!(
                processed = report.processed.len(),
                skipped = report.skipped(),
                duration_ms = report.elapsed.as_millis() as u64,
                "Batch run completed"
            );
        } else {
            warn!(
                processed = report.processed.len(),
                skipped = report.skipped(),
                failed = report.failures.len(),
                duration_ms = report.elapsed.as_millis() as u64,
                "Batch run completed with failures"
            );
        }

        Ok(report)
    }
}

async fn process_item(
    store: Arc<dyn ItemStore>,
    id: ItemId,
    pause: Duration,
    cancellation: CancellationToken,
) -> TaskOutcome {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => {
            debug!("Cancelled during processing pause");
            return TaskOutcome::Failed(TaskFailure::Cancelled { id });
        }
        _ = tokio::time::sleep(pause) => {}
    }

    let mut item = match store.find_by_id(id).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            debug!("Item vanished before processing");
            return TaskOutcome::Skipped { id, reason: SkipReason::Missing };
        }
        Err(source) => return TaskOutcome::Failed(TaskFailure::Store { id, source }),
    };

    if !item.mark_processed() {
        debug!("Item already processed");
        return TaskOutcome::Skipped { id, reason: SkipReason::AlreadyProcessed };
    }

    match store.save(item).await {
        Ok(saved) => {
            debug!("Item processed");
            TaskOutcome::Processed(saved)
        }
        Err(source) => TaskOutcome::Failed(TaskFailure::Store { id, source }),
    }
}
