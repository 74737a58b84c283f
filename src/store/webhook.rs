//! Local list mutated through the platform's shopping list services
//!
//! Writes go to a webhook that forwards `{"service", "name"}` bodies to the
//! named service. Reads come straight from the list file the platform keeps
//! on disk, so a snapshot reflects a mutation only once the platform has
//! written it back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::shopping_file;
use super::{ListReader, LocalList};
use crate::error::{Result, SyncError};
use crate::model::{ListSnapshot, StoreKind};

/// Services understood by the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShoppingService {
    AddItem,
    CompleteAll,
    ClearCompleted,
}

impl ShoppingService {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShoppingService::AddItem => "shopping_list.add_item",
            ShoppingService::CompleteAll => "shopping_list.complete_all",
            ShoppingService::ClearCompleted => "shopping_list.clear_completed_items",
        }
    }

    fn op(&self) -> &'static str {
        match self {
            ShoppingService::AddItem => "add_item",
            ShoppingService::CompleteAll => "complete_all",
            ShoppingService::ClearCompleted => "clear_completed_items",
        }
    }
}

#[derive(Debug, Serialize)]
struct ServiceCall<'a> {
    service: &'static str,
    name: &'a str,
}

pub struct WebhookShoppingList {
    path: PathBuf,
    webhook: Url,
    client: Client,
}

impl WebhookShoppingList {
    /// `timeout` bounds every service call; failed calls are not retried.
    pub fn new(path: impl AsRef<Path>, webhook: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("keep-list-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            webhook,
            client,
        })
    }

    async fn call(&self, service: ShoppingService, name: &str) -> Result<()> {
        let body = ServiceCall {
            service: service.as_str(),
            name,
        };
        debug!(service = service.as_str(), "calling shopping list service");

        let response = self
            .client
            .post(self.webhook.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::mutation(StoreKind::Local, service.op(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::mutation(
                StoreKind::Local,
                service.op(),
                format!("webhook returned {}", status),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ListReader for WebhookShoppingList {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn read(&mut self) -> Result<ListSnapshot> {
        shopping_file::read_snapshot(&self.path).await
    }
}

#[async_trait]
impl LocalList for WebhookShoppingList {
    async fn add_item(&mut self, text: &str) -> Result<()> {
        self.call(ShoppingService::AddItem, text).await
    }

    async fn mark_all_complete(&mut self) -> Result<()> {
        self.call(ShoppingService::CompleteAll, "").await
    }

    async fn clear_completed(&mut self) -> Result<()> {
        self.call(ShoppingService::ClearCompleted, "").await
    }
}
