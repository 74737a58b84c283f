//! List stores
//!
//! Each sync endpoint is wrapped in a store that can produce a fresh
//! [`ListSnapshot`] on every call and apply mutations to its backing data.
//!
//! ```text
//!   RemoteList (cloud note)          LocalList (shopping list)
//!   ├─ read                          ├─ read
//!   ├─ add_item                      ├─ add_item
//!   ├─ delete_item                   ├─ mark_all_complete
//!   └─ flush                         ├─ clear_completed
//!                                    └─ clear_all
//! ```
//!
//! The local side has two implementations, picked by configuration:
//! [`webhook::WebhookShoppingList`] mutates through service calls and
//! [`file::FileShoppingList`] edits the list file directly.

pub mod file;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod shopping_file;
pub mod webhook;

use async_trait::async_trait;

use crate::config::{Config, LocalBackend};
use crate::error::{Result, SyncError};
use crate::model::{ListItem, ListSnapshot, StoreKind};

pub use file::FileShoppingList;
pub use webhook::WebhookShoppingList;

/// Produces snapshots of a backing store. Never caches between calls.
#[async_trait]
pub trait ListReader: Send {
    fn kind(&self) -> StoreKind;

    async fn read(&mut self) -> Result<ListSnapshot>;
}

/// The cloud list. Writes may be buffered until [`RemoteList::flush`].
#[async_trait]
pub trait RemoteList: ListReader {
    /// Append an unchecked item at the bottom of the list.
    async fn add_item(&mut self, text: &str) -> Result<()>;

    /// Remove one item matching `item`. Fails with `ItemNotFound` when absent.
    async fn delete_item(&mut self, item: &ListItem) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;
}

/// The home-automation shopping list
#[async_trait]
pub trait LocalList: ListReader {
    /// Append an unchecked item. Duplicates are not filtered.
    async fn add_item(&mut self, text: &str) -> Result<()>;

    async fn mark_all_complete(&mut self) -> Result<()>;

    async fn clear_completed(&mut self) -> Result<()>;

    /// Remove every item.
    async fn clear_all(&mut self) -> Result<()> {
        self.mark_all_complete().await?;
        self.clear_completed().await
    }
}

/// Open the local list variant selected in the configuration.
pub fn open_local(config: &Config) -> Result<Box<dyn LocalList>> {
    match config.local_backend {
        LocalBackend::File => Ok(Box::new(FileShoppingList::new(&config.list_path))),
        LocalBackend::Webhook => {
            let webhook = config.webhook.clone().ok_or_else(|| {
                SyncError::Config("`webhook` is required for the webhook backend".into())
            })?;
            let list = WebhookShoppingList::new(&config.list_path, webhook, config.timeout())?;
            Ok(Box::new(list))
        }
    }
}
