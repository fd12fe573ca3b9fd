use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub mod telemetry;

pub use telemetry::{init_tracing, LogFormat};

// ============================================================================
// Item Types
// ============================================================================

/// Store-assigned item identifier
pub type ItemId = i64;

/// Processing state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Not yet visited by a batch run
    Unprocessed,
    /// Terminal: a batch run has persisted this item as processed
    Processed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 2] = [ItemStatus::Unprocessed, ItemStatus::Processed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Unprocessed => "unprocessed",
            ItemStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown item status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for ItemStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unprocessed" => Ok(ItemStatus::Unprocessed),
            "processed" => Ok(ItemStatus::Processed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A persisted item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub status: ItemStatus,
    pub email: String,
}

impl Item {
    pub fn from_draft(id: ItemId, draft: ItemDraft) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            status: draft.status,
            email: draft.email,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.status == ItemStatus::Processed
    }

    /// Flip to `Processed`. Returns false if the item already was.
    pub fn mark_processed(&mut self) -> bool {
        if self.is_processed() {
            return false;
        }
        self.status = ItemStatus::Processed;
        true
    }

    /// Overwrite every mutable field from a draft, keeping the id
    pub fn apply(&mut self, draft: ItemDraft) {
        self.name = draft.name;
        self.description = draft.description;
        self.status = draft.status;
        self.email = draft.email;
    }
}

/// Item fields before the store has assigned an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub status: ItemStatus,
    pub email: String,
}

impl ItemDraft {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: ItemStatus::Unprocessed,
            email: email.into(),
        }
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }
}

// ============================================================================
// Health & Metrics Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub name: String,
    pub capacity: u32,
    pub active_workers: u32,
    pub queued_tasks: u32,
    pub completed_tasks: u64,
    pub closed: bool,
}
