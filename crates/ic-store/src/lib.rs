//! Item Store
//!
//! Persistence boundary for items. The batch processor only needs
//! `find_all_ids`, `find_by_id` and `save`; the HTTP layer uses the rest.
//! Every implementation must be safe to call from many tasks at once.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use ic_common::{Item, ItemDraft, ItemId};
use thiserror::Error;

pub use memory::InMemoryItemStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteItemStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresItemStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row for item {id}: {message}")]
    Corrupt { id: ItemId, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn find_all(&self) -> Result<Vec<Item>>;

    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>>;

    async fn find_all_ids(&self) -> Result<Vec<ItemId>>;

    /// Insert a new item, letting the store assign its id
    async fn create(&self, draft: ItemDraft) -> Result<Item>;

    /// Insert if `item.id` is absent, update otherwise
    async fn save(&self, item: Item) -> Result<Item>;

    /// Returns true if an item was removed
    async fn delete_by_id(&self, id: ItemId) -> Result<bool>;
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn parse_status(id: ItemId, raw: &str) -> Result<ic_common::ItemStatus> {
    raw.parse().map_err(|e: ic_common::ParseStatusError| StoreError::Corrupt {
        id,
        message: e.to_string(),
    })
}
