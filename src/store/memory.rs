//! In-memory stores with a deterministic clock
//!
//! Every mutation advances the store's modification time by one second, so
//! tests can reason about timestamps exactly. Failures can be injected per
//! operation name.

use async_trait::async_trait;

use super::{ListReader, LocalList, RemoteList};
use crate::error::{Result, SyncError};
use crate::model::{epoch, ListItem, ListSnapshot, StoreKind, SyncWatermark, Timestamp};
use crate::state::WatermarkStore;

/// `secs` seconds after the epoch.
pub fn at(secs: i64) -> Timestamp {
    epoch() + chrono::Duration::seconds(secs)
}

#[derive(Debug, Clone)]
struct MemoryList {
    kind: StoreKind,
    items: Vec<ListItem>,
    modified_at: Timestamp,
    fail_on: Option<&'static str>,
    mutations: Vec<String>,
}

impl MemoryList {
    fn new(kind: StoreKind, items: Vec<ListItem>, modified_at: Timestamp) -> Self {
        Self {
            kind,
            items,
            modified_at,
            fail_on: None,
            mutations: Vec::new(),
        }
    }

    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot::new(self.items.clone(), self.modified_at)
    }

    fn mutate(&mut self, op: &'static str, detail: &str) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(SyncError::mutation(self.kind, op, "injected failure"));
        }
        self.mutations.push(format!("{} {}", op, detail).trim_end().to_string());
        self.modified_at = self.modified_at + chrono::Duration::seconds(1);
        Ok(())
    }
}

/// Remote store whose writes stay buffered until `flush`.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    list: MemoryList,
    phantoms: Vec<ListItem>,
    dirty: bool,
    flushes: usize,
}

impl MemoryRemote {
    pub fn new(items: Vec<ListItem>, modified_at: Timestamp) -> Self {
        Self {
            list: MemoryList::new(StoreKind::Remote, items, modified_at),
            phantoms: Vec::new(),
            dirty: false,
            flushes: 0,
        }
    }

    /// Make `op` fail with `MutationFailed`.
    pub fn fail_on(mut self, op: &'static str) -> Self {
        self.list.fail_on = Some(op);
        self
    }

    /// An item that shows up in snapshots but is already gone when deleted.
    pub fn with_phantom(mut self, item: ListItem) -> Self {
        self.phantoms.push(item);
        self
    }

    pub fn items(&self) -> &[ListItem] {
        &self.list.items
    }

    pub fn modified_at(&self) -> Timestamp {
        self.list.modified_at
    }

    pub fn mutations(&self) -> &[String] {
        &self.list.mutations
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[async_trait]
impl ListReader for MemoryRemote {
    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    async fn read(&mut self) -> Result<ListSnapshot> {
        let mut snapshot = self.list.snapshot();
        snapshot.items.extend(self.phantoms.iter().cloned());
        Ok(snapshot)
    }
}

#[async_trait]
impl RemoteList for MemoryRemote {
    async fn add_item(&mut self, text: &str) -> Result<()> {
        self.list.mutate("add_item", text)?;
        self.list.items.push(ListItem::unchecked(text));
        self.dirty = true;
        Ok(())
    }

    async fn delete_item(&mut self, item: &ListItem) -> Result<()> {
        if let Some(pos) = self.phantoms.iter().position(|p| p == item) {
            self.phantoms.remove(pos);
            return Err(SyncError::ItemNotFound {
                store: StoreKind::Remote,
                text: item.text.clone(),
            });
        }
        let Some(pos) = self.list.items.iter().position(|i| i == item) else {
            return Err(SyncError::ItemNotFound {
                store: StoreKind::Remote,
                text: item.text.clone(),
            });
        };
        self.list.mutate("delete_item", &item.text)?;
        self.list.items.remove(pos);
        self.dirty = true;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.list.fail_on == Some("flush") {
            return Err(SyncError::mutation(StoreKind::Remote, "flush", "injected failure"));
        }
        self.flushes += 1;
        self.dirty = false;
        Ok(())
    }
}

/// Local store applying every mutation immediately.
#[derive(Debug, Clone)]
pub struct MemoryLocal {
    list: MemoryList,
}

impl MemoryLocal {
    pub fn new(items: Vec<ListItem>, modified_at: Timestamp) -> Self {
        Self {
            list: MemoryList::new(StoreKind::Local, items, modified_at),
        }
    }

    pub fn fail_on(mut self, op: &'static str) -> Self {
        self.list.fail_on = Some(op);
        self
    }

    pub fn items(&self) -> &[ListItem] {
        &self.list.items
    }

    pub fn modified_at(&self) -> Timestamp {
        self.list.modified_at
    }

    pub fn mutations(&self) -> &[String] {
        &self.list.mutations
    }
}

#[async_trait]
impl ListReader for MemoryLocal {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn read(&mut self) -> Result<ListSnapshot> {
        Ok(self.list.snapshot())
    }
}

#[async_trait]
impl LocalList for MemoryLocal {
    async fn add_item(&mut self, text: &str) -> Result<()> {
        self.list.mutate("add_item", text)?;
        self.list.items.push(ListItem::unchecked(text));
        Ok(())
    }

    async fn mark_all_complete(&mut self) -> Result<()> {
        self.list.mutate("complete_all", "")?;
        self.list.items.iter_mut().for_each(|item| item.done = true);
        Ok(())
    }

    async fn clear_completed(&mut self) -> Result<()> {
        self.list.mutate("clear_completed_items", "")?;
        self.list.items.retain(|item| !item.done);
        Ok(())
    }
}

/// Watermark store that counts writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryWatermarkStore {
    stored: Option<SyncWatermark>,
    saves: usize,
}

impl MemoryWatermarkStore {
    pub fn with(watermark: SyncWatermark) -> Self {
        Self {
            stored: Some(watermark),
            saves: 0,
        }
    }

    pub fn stored(&self) -> Option<SyncWatermark> {
        self.stored
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self) -> Result<SyncWatermark> {
        Ok(self.stored.unwrap_or_default())
    }

    fn save(&mut self, watermark: &SyncWatermark) -> Result<()> {
        self.stored = Some(*watermark);
        self.saves += 1;
        Ok(())
    }
}
