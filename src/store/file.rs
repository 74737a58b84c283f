//! Local list backed directly by the shopping list file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::shopping_file::{self, ShoppingEntry};
use super::{ListReader, LocalList};
use crate::error::Result;
use crate::model::{ListSnapshot, StoreKind};

/// Edits the list file in place. Every mutation rewrites the whole file.
pub struct FileShoppingList {
    path: PathBuf,
}

impl FileShoppingList {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn rewrite<F>(&self, op: &'static str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<ShoppingEntry>) + Send,
    {
        let mut entries = shopping_file::load_entries(&self.path).await?;
        edit(&mut entries);
        debug!(op, items = entries.len(), "rewriting list file");
        shopping_file::save_entries(&self.path, &entries, op).await
    }
}

#[async_trait]
impl ListReader for FileShoppingList {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn read(&mut self) -> Result<ListSnapshot> {
        shopping_file::read_snapshot(&self.path).await
    }
}

#[async_trait]
impl LocalList for FileShoppingList {
    async fn add_item(&mut self, text: &str) -> Result<()> {
        let entry = ShoppingEntry::new(text);
        self.rewrite("add_item", move |entries| entries.push(entry))
            .await
    }

    async fn mark_all_complete(&mut self) -> Result<()> {
        self.rewrite("complete_all", |entries| {
            entries.iter_mut().for_each(|entry| entry.complete = true)
        })
        .await
    }

    async fn clear_completed(&mut self) -> Result<()> {
        self.rewrite("clear_completed_items", |entries| {
            entries.retain(|entry| !entry.complete)
        })
        .await
    }

    async fn clear_all(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "clearing list file");
        shopping_file::save_entries(&self.path, &[], "clear_all").await
    }
}
