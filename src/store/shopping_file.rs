//! On-disk shopping list format
//!
//! The home-automation platform persists its shopping list as a JSON array of
//! `{"name", "id", "complete"}` objects. The file's mtime is the list's
//! modification time. Unknown fields are carried through rewrites.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};
use crate::model::{from_system_time, ListItem, ListSnapshot, StoreKind, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingEntry {
    pub name: String,
    pub id: String,
    pub complete: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShoppingEntry {
    /// A new unchecked entry with a random hex id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: uuid::Uuid::new_v4().simple().to_string(),
            complete: false,
            extra: Map::new(),
        }
    }

    pub fn to_item(&self) -> ListItem {
        ListItem {
            text: self.name.clone(),
            done: self.complete,
        }
    }
}

/// Modification time of the list file.
pub async fn modified_at(path: &Path) -> Result<Timestamp> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| SyncError::unavailable(StoreKind::Local, format!("{}: {}", path.display(), e)))?;
    let modified = metadata
        .modified()
        .map_err(|e| SyncError::unavailable(StoreKind::Local, e))?;
    Ok(from_system_time(modified))
}

/// Parse the entries stored in the list file.
pub async fn load_entries(path: &Path) -> Result<Vec<ShoppingEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SyncError::unavailable(StoreKind::Local, format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| {
        SyncError::unavailable(
            StoreKind::Local,
            format!("malformed list file {}: {}", path.display(), e),
        )
    })
}

/// Replace the list file content.
pub async fn save_entries(path: &Path, entries: &[ShoppingEntry], op: &'static str) -> Result<()> {
    let content = serde_json::to_string_pretty(entries)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| SyncError::mutation(StoreKind::Local, op, e))
}

/// Take a snapshot of the list file.
pub async fn read_snapshot(path: &Path) -> Result<ListSnapshot> {
    // mtime first: a write landing between the two reads makes the snapshot
    // look older than its content, which only causes an extra sync.
    let modified_at = modified_at(path).await?;
    let entries = load_entries(path).await?;
    let items = entries.iter().map(ShoppingEntry::to_item).collect();
    Ok(ListSnapshot::new(items, modified_at))
}
