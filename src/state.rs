//! Persisted run state
//!
//! Two small JSON files live next to the configuration:
//! - `last_updated.json`: the sync watermark
//! - `token.json`: the cached master token for the cloud account

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::SyncWatermark;

pub const UPDATED_NAME: &str = "last_updated.json";
pub const TOKEN_NAME: &str = "token.json";

/// Where the watermark is kept between runs
pub trait WatermarkStore: Send {
    /// Stored watermark, or epoch/epoch when nothing was stored yet.
    fn load(&self) -> Result<SyncWatermark>;

    fn save(&mut self, watermark: &SyncWatermark) -> Result<()>;
}

/// Watermark stored as JSON in the config directory
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(UPDATED_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Result<SyncWatermark> {
        if !self.path.exists() {
            debug!("No watermark yet, starting from epoch");
            return Ok(SyncWatermark::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            SyncError::State(format!("malformed {}: {}", self.path.display(), e))
        })
    }

    fn save(&mut self, watermark: &SyncWatermark) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string(watermark)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Cached master token for resuming a session
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(TOKEN_NAME),
        }
    }

    /// The cached token, if one was saved.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let file: TokenFile = serde_json::from_str(&content).map_err(|e| {
            SyncError::State(format!("malformed {}: {}", self.path.display(), e))
        })?;
        Ok(Some(file.token))
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string(&TokenFile {
            token: token.to_string(),
        })?;
        std::fs::write(&self.path, content)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        debug!("Saved master token");
        Ok(())
    }
}
