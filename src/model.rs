//! Data Models for List Sync
//!
//! Snapshots are immutable views of one store taken at a point in time.
//! A mutation never edits a snapshot; the store is read again instead.

use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Modification time as reported by a store.
pub type Timestamp = DateTime<Utc>;

/// The zero timestamp used before the first successful sync.
pub fn epoch() -> Timestamp {
    DateTime::<Utc>::from(SystemTime::UNIX_EPOCH)
}

/// Convert a filesystem modification time.
pub fn from_system_time(time: SystemTime) -> Timestamp {
    DateTime::<Utc>::from(time)
}

/// Which of the two sync endpoints a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// The cloud-hosted list
    Remote,
    /// The home-automation shopping list
    Local,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Remote => f.write_str("remote"),
            StoreKind::Local => f.write_str("local"),
        }
    }
}

/// A single entry of a list. Identity is the text; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    pub done: bool,
}

impl ListItem {
    pub fn unchecked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn checked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: true,
        }
    }
}

/// Items of one store plus its last-modified time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub items: Vec<ListItem>,
    pub modified_at: Timestamp,
}

impl ListSnapshot {
    pub fn new(items: Vec<ListItem>, modified_at: Timestamp) -> Self {
        Self { items, modified_at }
    }

    pub fn checked(&self) -> impl Iterator<Item = &ListItem> {
        self.items.iter().filter(|item| item.done)
    }

    pub fn unchecked(&self) -> impl Iterator<Item = &ListItem> {
        self.items.iter().filter(|item| !item.done)
    }

    /// Texts of the unchecked items, in list order.
    pub fn unchecked_texts(&self) -> Vec<&str> {
        self.unchecked().map(|item| item.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One line per item with a ballot box showing its state.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|item| {
                let mark = if item.done { '☑' } else { '☐' };
                format!("{} {}", mark, item.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Modification times of both stores as of the last successful sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWatermark {
    #[serde(rename = "google_keep", default = "epoch")]
    pub remote_modified_at: Timestamp,
    #[serde(rename = "home_assistant", default = "epoch")]
    pub local_modified_at: Timestamp,
}

impl SyncWatermark {
    pub fn new(remote_modified_at: Timestamp, local_modified_at: Timestamp) -> Self {
        Self {
            remote_modified_at,
            local_modified_at,
        }
    }

    /// Watermark recorded by a run that observed these two snapshots.
    pub fn observed(remote: &ListSnapshot, local: &ListSnapshot) -> Self {
        Self::new(remote.modified_at, local.modified_at)
    }
}

impl Default for SyncWatermark {
    fn default() -> Self {
        Self::new(epoch(), epoch())
    }
}
