//! WorkerPool - fixed-capacity executor gate for batch tasks
//!
//! Every task is spawned immediately but must hold a semaphore permit while
//! it runs, so at most `capacity` tasks execute at once and the rest wait in
//! FIFO order on the semaphore. The pool is built once at startup and shared
//! (`Arc<WorkerPool>`) by every batch run; `close` is for process shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use ic_common::PoolStats;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::PoolError;

pub const DEFAULT_POOL_CAPACITY: u32 = 10;

pub struct WorkerPool {
    name: String,
    capacity: u32,

    /// Pool-level concurrency semaphore
    semaphore: Arc<Semaphore>,

    /// Tasks waiting for a permit
    queued_tasks: Arc<AtomicU32>,

    /// Tasks holding a permit
    active_workers: Arc<AtomicU32>,

    completed_tasks: Arc<AtomicU64>,
}

/// Decrements the active counter even if the task panics
struct ActiveGuard(Arc<AtomicU32>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// `capacity` is clamped to at least one worker
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        let name = name.into();

        info!(pool = %name, capacity, "Creating worker pool");

        Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            queued_tasks: Arc::new(AtomicU32::new(0)),
            active_workers: Arc::new(AtomicU32::new(0)),
            completed_tasks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn `task` onto the runtime; it starts once a worker slot frees up.
    ///
    /// Dropping the returned handle detaches the task rather than aborting it.
    pub fn spawn<F, T>(&self, task: F) -> JoinHandle<Result<T, PoolError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let pool_name = self.name.clone();
        let semaphore = self.semaphore.clone();
        let queued_tasks = self.queued_tasks.clone();
        let active_workers = self.active_workers.clone();
        let completed_tasks = self.completed_tasks.clone();

        queued_tasks.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            queued_tasks.fetch_sub(1, Ordering::SeqCst);

            let _permit = match permit {
                Ok(p) => p,
                Err(_) => {
                    debug!(pool = %pool_name, "Pool closed, dropping queued task");
                    return Err(PoolError::Closed { pool: pool_name });
                }
            };

            active_workers.fetch_add(1, Ordering::SeqCst);
            let _active = ActiveGuard(active_workers);

            let output = task.await;
            completed_tasks.fetch_add(1, Ordering::SeqCst);
            Ok(output)
        })
    }

    /// Stop admitting work. Running tasks finish; queued tasks fail.
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            info!(pool = %self.name, "Closing worker pool");
            self.semaphore.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn active_workers(&self) -> u32 {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn queued_tasks(&self) -> u32 {
        self.queued_tasks.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.name.clone(),
            capacity: self.capacity,
            active_workers: self.active_workers(),
            queued_tasks: self.queued_tasks(),
            completed_tasks: self.completed_tasks.load(Ordering::SeqCst),
            closed: self.is_closed(),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new("batch", DEFAULT_POOL_CAPACITY)
    }
}
