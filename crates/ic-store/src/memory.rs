//! In-memory item store backed by a concurrent map

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use ic_common::{Item, ItemDraft, ItemId};
use tracing::debug;

use crate::{ItemStore, Result};

pub struct InMemoryItemStore {
    items: DashMap<ItemId, Item>,
    next_id: AtomicI64,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Build a store pre-populated with drafts, ids assigned in order from 1
    pub fn with_items(drafts: impl IntoIterator<Item = ItemDraft>) -> Self {
        let store = Self::new();
        for draft in drafts {
            store.insert_draft(draft);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn insert_draft(&self, draft: ItemDraft) -> Item {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let item = Item::from_draft(id, draft);
        self.items.insert(id, item.clone());
        item
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_all(&self) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.items.get(&id).map(|e| e.value().clone()))
    }

    async fn find_all_ids(&self) -> Result<Vec<ItemId>> {
        let mut ids: Vec<ItemId> = self.items.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn create(&self, draft: ItemDraft) -> Result<Item> {
        let item = self.insert_draft(draft);
        debug!(item_id = item.id, "Created item");
        Ok(item)
    }

    async fn save(&self, item: Item) -> Result<Item> {
        // Keep the sequence ahead of explicitly supplied ids
        self.next_id.fetch_max(item.id.saturating_add(1), Ordering::SeqCst);
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete_by_id(&self, id: ItemId) -> Result<bool> {
        Ok(self.items.remove(&id).is_some())
    }
}
