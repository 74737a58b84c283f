//! Configuration management
//!
//! `config.json` keeps the key spellings earlier releases wrote (`noteID`,
//! `listPath`), so existing configuration directories keep working.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyncError};
use crate::keep::auth::default_android_id;

pub const CONFIG_NAME: &str = "config.json";

/// Directory name under the platform config dir
pub const APP_DIR: &str = "gkeep-shopping";

pub const KEYS: &[&str] = &[
    "email",
    "password",
    "webhook",
    "noteID",
    "listPath",
    "localBackend",
    "timeoutMs",
    "androidId",
];

const MASK: &str = "********";

/// How the local shopping list is changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalBackend {
    /// Service calls through the platform webhook
    #[default]
    Webhook,
    /// Rewrite the list file in place
    File,
}

impl fmt::Display for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalBackend::Webhook => f.write_str("webhook"),
            LocalBackend::File => f.write_str("file"),
        }
    }
}

impl FromStr for LocalBackend {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "webhook" => Ok(LocalBackend::Webhook),
            "file" => Ok(LocalBackend::File),
            other => Err(SyncError::Config(format!(
                "unknown local backend '{}' (expected webhook or file)",
                other
            ))),
        }
    }
}

fn default_timeout_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Url>,
    #[serde(rename = "noteID", default)]
    pub note_id: String,
    #[serde(rename = "listPath", default)]
    pub list_path: PathBuf,
    #[serde(rename = "localBackend", default)]
    pub local_backend: LocalBackend,
    #[serde(rename = "timeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(rename = "androidId", default, skip_serializing_if = "Option::is_none")]
    pub android_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: None,
            webhook: None,
            note_id: String::new(),
            list_path: PathBuf::new(),
            local_backend: LocalBackend::default(),
            timeout_ms: default_timeout_ms(),
            android_id: None,
        }
    }
}

impl Config {
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_NAME)
    }

    /// Load without validating. A missing file yields the defaults.
    pub fn read(config_dir: &Path) -> Result<Self> {
        let path = Self::path(config_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Load a configuration ready for a sync run.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = Self::path(config_dir);
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "no configuration at {}",
                path.display()
            )));
        }

        let config = Self::read(config_dir)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(config_dir), content)?;
        Ok(())
    }

    /// Checks the account fields only.
    pub fn validate_account(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(SyncError::Config(format!(
                "`email` must be an email address, got '{}'",
                self.email
            )));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_account()?;

        if self.note_id.trim().is_empty() {
            return Err(SyncError::Config(
                "`noteID` is empty; run `setup` to pick a list".into(),
            ));
        }

        match &self.webhook {
            Some(url) if !matches!(url.scheme(), "http" | "https") => {
                return Err(SyncError::Config(format!(
                    "`webhook` must be an http(s) URL, got '{}'",
                    url
                )));
            }
            None if self.local_backend == LocalBackend::Webhook => {
                return Err(SyncError::Config(
                    "`webhook` is required for the webhook backend".into(),
                ));
            }
            _ => {}
        }

        if !self.list_path.exists() {
            return Err(SyncError::Config(format!(
                "`listPath` {} does not exist",
                self.list_path.display()
            )));
        }

        Ok(())
    }

    /// Timeout for local service calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn android_id(&self) -> String {
        self.android_id
            .clone()
            .unwrap_or_else(|| default_android_id(&self.email))
    }

    /// Display value of a key. The password is masked.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "email" => self.email.clone(),
            "password" => self
                .password
                .as_ref()
                .map(|_| MASK.to_string())
                .unwrap_or_default(),
            "webhook" => self
                .webhook
                .as_ref()
                .map(Url::to_string)
                .unwrap_or_default(),
            "noteID" => self.note_id.clone(),
            "listPath" => self.list_path.display().to_string(),
            "localBackend" => self.local_backend.to_string(),
            "timeoutMs" => self.timeout_ms.to_string(),
            "androidId" => self.android_id(),
            _ => return Err(SyncError::Config(format!("Unknown config key: {}", key))),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match key {
            "email" => self.email = value.to_string(),
            "password" => self.password = optional(value),
            "webhook" => {
                self.webhook = if value.is_empty() {
                    None
                } else {
                    Some(Url::parse(value).map_err(|e| {
                        SyncError::Config(format!("invalid webhook URL '{}': {}", value, e))
                    })?)
                }
            }
            "noteID" => self.note_id = value.to_string(),
            "listPath" => self.list_path = PathBuf::from(value),
            "localBackend" => self.local_backend = value.parse()?,
            "timeoutMs" => {
                self.timeout_ms = value.parse().map_err(|_| {
                    SyncError::Config(format!("timeoutMs must be a number, got '{}'", value))
                })?
            }
            "androidId" => self.android_id = optional(value),
            _ => return Err(SyncError::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}

/// Resolve the configuration directory.
///
/// An explicit directory must exist. Without one, root has no sensible
/// per-user default and is refused.
pub fn config_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            return Err(SyncError::Config(format!(
                "configuration directory {} does not exist",
                dir.display()
            )));
        }
        return Ok(dir);
    }

    if running_as_root() {
        return Err(SyncError::Config(
            "Need a configuration directory path when running as root".into(),
        ));
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}
