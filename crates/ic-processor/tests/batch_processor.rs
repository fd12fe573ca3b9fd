//! Batch Processor Tests
//!
//! Tests for:
//! - Completeness, idempotence and non-interference
//! - Missing-item tolerance
//! - Partial-failure propagation
//! - Bounded concurrency
//! - Concurrent runs racing on the same items
//! - Cancellation during the processing pause

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ic_common::{Item, ItemDraft, ItemId, ItemStatus};
use ic_processor::{
    BatchError, BatchProcessor, BatchSettings, CancellationToken, TaskFailure, WorkerPool,
};
use ic_store::{InMemoryItemStore, ItemStore, StoreError};
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Test stores
// ============================================================================

/// Fails `save` for one id, delegating everything else
struct FailingSaveStore {
    inner: InMemoryItemStore,
    fail_id: ItemId,
}

#[async_trait]
impl ItemStore for FailingSaveStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn find_all(&self) -> ic_store::Result<Vec<Item>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: ItemId) -> ic_store::Result<Option<Item>> {
        self.inner.find_by_id(id).await
    }

    async fn find_all_ids(&self) -> ic_store::Result<Vec<ItemId>> {
        self.inner.find_all_ids().await
    }

    async fn create(&self, draft: ItemDraft) -> ic_store::Result<Item> {
        self.inner.create(draft).await
    }

    async fn save(&self, item: Item) -> ic_store::Result<Item> {
        if item.id == self.fail_id {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.save(item).await
    }

    async fn delete_by_id(&self, id: ItemId) -> ic_store::Result<bool> {
        self.inner.delete_by_id(id).await
    }
}

/// Deletes `vanish_id` right after handing out the id snapshot
struct VanishingStore {
    inner: InMemoryItemStore,
    vanish_id: ItemId,
}

#[async_trait]
impl ItemStore for VanishingStore {
    fn backend(&self) -> &'static str {
        "vanishing"
    }

    async fn find_all(&self) -> ic_store::Result<Vec<Item>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: ItemId) -> ic_store::Result<Option<Item>> {
        self.inner.find_by_id(id).await
    }

    async fn find_all_ids(&self) -> ic_store::Result<Vec<ItemId>> {
        let ids = self.inner.find_all_ids().await?;
        self.inner.delete_by_id(self.vanish_id).await?;
        Ok(ids)
    }

    async fn create(&self, draft: ItemDraft) -> ic_store::Result<Item> {
        self.inner.create(draft).await
    }

    async fn save(&self, item: Item) -> ic_store::Result<Item> {
        self.inner.save(item).await
    }

    async fn delete_by_id(&self, id: ItemId) -> ic_store::Result<bool> {
        self.inner.delete_by_id(id).await
    }
}

/// Tracks how many lookups are in flight at once
struct ConcurrencyTrackingStore {
    inner: InMemoryItemStore,
    in_flight: AtomicU32,
    peak: AtomicU32,
    hold: Duration,
}

#[async_trait]
impl ItemStore for ConcurrencyTrackingStore {
    fn backend(&self) -> &'static str {
        "tracking"
    }

    async fn find_all(&self) -> ic_store::Result<Vec<Item>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: ItemId) -> ic_store::Result<Option<Item>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_all_ids(&self) -> ic_store::Result<Vec<ItemId>> {
        self.inner.find_all_ids().await
    }

    async fn create(&self, draft: ItemDraft) -> ic_store::Result<Item> {
        self.inner.create(draft).await
    }

    async fn save(&self, item: Item) -> ic_store::Result<Item> {
        self.inner.save(item).await
    }

    async fn delete_by_id(&self, id: ItemId) -> ic_store::Result<bool> {
        self.inner.delete_by_id(id).await
    }
}

/// Panics when looking up one id
struct PanickingStore {
    inner: InMemoryItemStore,
    panic_id: ItemId,
}

#[async_trait]
impl ItemStore for PanickingStore {
    fn backend(&self) -> &'static str {
        "panicking"
    }

    async fn find_all(&self) -> ic_store::Result<Vec<Item>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: ItemId) -> ic_store::Result<Option<Item>> {
        if id == self.panic_id {
            panic!("lookup exploded for {}", id);
        }
        self.inner.find_by_id(id).await
    }

    async fn find_all_ids(&self) -> ic_store::Result<Vec<ItemId>> {
        self.inner.find_all_ids().await
    }

    async fn create(&self, draft: ItemDraft) -> ic_store::Result<Item> {
        self.inner.create(draft).await
    }

    async fn save(&self, item: Item) -> ic_store::Result<Item> {
        self.inner.save(item).await
    }

    async fn delete_by_id(&self, id: ItemId) -> ic_store::Result<bool> {
        self.inner.delete_by_id(id).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn draft(n: usize) -> ItemDraft {
    ItemDraft::new(format!("item-{}", n), format!("description {}", n), "ab@cd.ef")
}

fn unprocessed(count: usize) -> Vec<ItemDraft> {
    (1..=count).map(draft).collect()
}

fn fast_settings() -> BatchSettings {
    BatchSettings::with_delay(Duration::from_millis(1))
}

fn processor(store: Arc<dyn ItemStore>, capacity: u32) -> BatchProcessor {
    BatchProcessor::new(store, Arc::new(WorkerPool::new("test", capacity)), fast_settings())
}

fn ids(items: &[Item]) -> Vec<ItemId> {
    items.iter().map(|i| i.id).collect()
}

async fn all_processed(store: &dyn ItemStore) -> bool {
    store
        .find_all()
        .await
        .unwrap()
        .iter()
        .all(|i| i.status == ItemStatus::Processed)
}

// ============================================================================
// Core properties
// ============================================================================

#[tokio::test]
async fn test_processes_every_unprocessed_item() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(25)));
    let processor = processor(store.clone(), 10);

    let items = assert_ok!(processor.process_all().await);

    assert_eq!(items.len(), 25);
    assert!(items.iter().all(|i| i.is_processed()));
    assert_eq!(ids(&items), (1..=25).collect::<Vec<_>>());
    assert!(all_processed(store.as_ref()).await);
}

#[tokio::test]
async fn test_second_run_is_empty() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(5)));
    let processor = processor(store.clone(), 3);

    assert_eq!(assert_ok!(processor.process_all().await).len(), 5);
    assert!(assert_ok!(processor.process_all().await).is_empty());
}

#[tokio::test]
async fn test_mixed_statuses_example() {
    let store = Arc::new(InMemoryItemStore::with_items(vec![
        draft(1),
        draft(2).with_status(ItemStatus::Processed),
        draft(3),
    ]));
    let before = store.find_by_id(2).await.unwrap().unwrap();
    let processor = processor(store.clone(), 10);

    let items = assert_ok!(processor.process_all().await);
    assert_eq!(ids(&items), vec![1, 3]);
    assert!(items.iter().all(|i| i.status == ItemStatus::Processed));

    // Pre-processed item untouched
    assert_eq!(store.find_by_id(2).await.unwrap().unwrap(), before);
    assert!(all_processed(store.as_ref()).await);

    assert!(assert_ok!(processor.process_all().await).is_empty());
}

#[tokio::test]
async fn test_empty_store() {
    let store = Arc::new(InMemoryItemStore::new());
    let processor = processor(store, 2);

    let report = processor.process_all_report().await.unwrap();
    assert_eq!(report.total, 0);
    assert!(report.is_success());
    assert!(report.processed.is_empty());
}

#[tokio::test]
async fn test_items_created_after_snapshot_are_not_included() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(3)));
    let processor = BatchProcessor::new(
        store.clone(),
        Arc::new(WorkerPool::new("test", 3)),
        BatchSettings::with_delay(Duration::from_millis(50)),
    );

    let run = tokio::spawn(async move { processor.process_all().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = store.create(draft(99)).await.unwrap();

    let items = run.await.unwrap().unwrap();
    assert_eq!(ids(&items), vec![1, 2, 3]);
    assert!(!store.find_by_id(late.id).await.unwrap().unwrap().is_processed());
}

// ============================================================================
// Missing items and failures
// ============================================================================

#[tokio::test]
async fn test_missing_item_is_not_an_error() {
    let store = Arc::new(VanishingStore {
        inner: InMemoryItemStore::with_items(unprocessed(4)),
        vanish_id: 2,
    });
    let processor = processor(store.clone(), 4);

    let report = processor.process_all_report().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.skipped_missing, 1);
    assert_eq!(ids(&report.processed), vec![1, 3, 4]);
    assert!(store.find_by_id(2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_one_failed_save_fails_the_batch_but_not_the_others() {
    let store = Arc::new(FailingSaveStore {
        inner: InMemoryItemStore::with_items(unprocessed(6)),
        fail_id: 4,
    });
    let processor = processor(store.clone(), 2);

    let err = assert_err!(processor.process_all().await);

    match &err {
        BatchError::TasksFailed { failures, processed, skipped } => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0], TaskFailure::Store { id: 4, .. }));
            assert_eq!(ids(processed), vec![1, 2, 3, 5, 6]);
            assert_eq!(*skipped, 0);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Other items are durably processed; the failed one is not
    for item in store.find_all().await.unwrap() {
        assert_eq!(item.is_processed(), item.id != 4, "item {}", item.id);
    }
}

#[tokio::test]
async fn test_snapshot_failure_dispatches_nothing() {
    struct BrokenStore;

    #[async_trait]
    impl ItemStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }
        async fn find_all(&self) -> ic_store::Result<Vec<Item>> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn find_by_id(&self, _id: ItemId) -> ic_store::Result<Option<Item>> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn find_all_ids(&self) -> ic_store::Result<Vec<ItemId>> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn create(&self, _draft: ItemDraft) -> ic_store::Result<Item> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn save(&self, _item: Item) -> ic_store::Result<Item> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn delete_by_id(&self, _id: ItemId) -> ic_store::Result<bool> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    let pool = Arc::new(WorkerPool::new("test", 2));
    let processor = BatchProcessor::new(Arc::new(BrokenStore), pool.clone(), fast_settings());

    let err = assert_err!(processor.process_all().await);
    assert!(matches!(err, BatchError::Snapshot(_)));
    assert_eq!(pool.stats().completed_tasks, 0);
}

#[tokio::test]
async fn test_panicking_task_is_reported_as_failure() {
    let store = Arc::new(PanickingStore {
        inner: InMemoryItemStore::with_items(unprocessed(3)),
        panic_id: 2,
    });
    let pool = Arc::new(WorkerPool::new("test", 3));
    let processor = BatchProcessor::new(store.clone(), pool.clone(), fast_settings());

    let err = assert_err!(processor.process_all().await);
    assert_eq!(err.failures().len(), 1);
    assert!(matches!(err.failures()[0], TaskFailure::Panicked { id: 2, .. }));
    assert_eq!(ids(err.processed()), vec![1, 3]);
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test]
async fn test_closed_pool_fails_every_task() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(3)));
    let pool = Arc::new(WorkerPool::new("test", 2));
    pool.close();
    let processor = BatchProcessor::new(store.clone(), pool, fast_settings());

    let err = assert_err!(processor.process_all().await);
    assert_eq!(err.failures().len(), 3);
    assert!(err
        .failures()
        .iter()
        .all(|f| matches!(f, TaskFailure::PoolClosed { .. })));
    assert!(err.processed().is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_never_exceeds_pool_capacity() {
    let store = Arc::new(ConcurrencyTrackingStore {
        inner: InMemoryItemStore::with_items(unprocessed(30)),
        in_flight: AtomicU32::new(0),
        peak: AtomicU32::new(0),
        hold: Duration::from_millis(10),
    });
    let pool = Arc::new(WorkerPool::new("test", 4));
    let processor = BatchProcessor::new(store.clone(), pool.clone(), fast_settings());

    let items = assert_ok!(processor.process_all().await);

    assert_eq!(items.len(), 30);
    let peak = store.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency {} exceeded capacity", peak);
    assert!(peak >= 2, "expected some parallelism, peak was {}", peak);
    assert_eq!(pool.stats().completed_tasks, 30);
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_pool_is_reused_across_runs() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(4)));
    let pool = Arc::new(WorkerPool::new("shared", 2));
    let processor = BatchProcessor::new(store.clone(), pool.clone(), fast_settings());

    assert_ok!(processor.process_all().await);
    store.create(draft(5)).await.unwrap();
    let second = assert_ok!(processor.process_all().await);

    assert_eq!(ids(&second), vec![5]);
    assert_eq!(pool.stats().completed_tasks, 9);
    assert!(!pool.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_runs_race_safely() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(40)));
    let pool = Arc::new(WorkerPool::new("test", 10));
    let processor = Arc::new(BatchProcessor::new(store.clone(), pool, fast_settings()));

    let (a, b) = tokio::join!(processor.process_all(), processor.process_all());
    let (a, b) = (a.unwrap(), b.unwrap());

    // No duplicates within a run
    let a_ids: HashSet<ItemId> = ids(&a).into_iter().collect();
    let b_ids: HashSet<ItemId> = ids(&b).into_iter().collect();
    assert_eq!(a_ids.len(), a.len());
    assert_eq!(b_ids.len(), b.len());

    // Both runs may claim the same item; together they cover everything
    let union: HashSet<ItemId> = a_ids.union(&b_ids).copied().collect();
    assert_eq!(union, (1..=40).collect::<HashSet<_>>());
    assert!(all_processed(store.as_ref()).await);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_during_pause_fails_the_batch() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(3)));
    let cancellation = CancellationToken::new();
    let pool = Arc::new(WorkerPool::new("test", 3));
    let processor = BatchProcessor::new(
        store.clone(),
        pool.clone(),
        BatchSettings::with_delay(Duration::from_secs(30)),
    )
    .with_cancellation(cancellation.clone());

    let run = tokio::spawn(async move { processor.process_all().await });

    for _ in 0..100 {
        if pool.active_workers() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancellation.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cancelled run should finish promptly")
        .unwrap()
        .unwrap_err();

    assert_eq!(err.failures().len(), 3);
    assert!(err
        .failures()
        .iter()
        .all(|f| matches!(f, TaskFailure::Cancelled { .. })));
    assert!(err.processed().is_empty());

    // Still cancelled afterwards, nothing was written
    assert!(cancellation.is_cancelled());
    assert!(store.find_all().await.unwrap().iter().all(|i| !i.is_processed()));
}

#[tokio::test]
async fn test_already_cancelled_processes_nothing() {
    let store = Arc::new(InMemoryItemStore::with_items(unprocessed(2)));
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let processor = processor(store.clone(), 2).with_cancellation(cancellation);

    let err = assert_err!(processor.process_all().await);
    assert_eq!(err.failures().len(), 2);
    assert!(store.find_all().await.unwrap().iter().all(|i| !i.is_processed()));
}
