//! Error types for keep-list-sync

use std::fmt;

use thiserror::Error;

use crate::model::StoreKind;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cached token was rejected: {0}")]
    AuthExpired(String),

    #[error("Login rejected: {0}")]
    InvalidCredentials(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("{store} list unavailable: {reason}")]
    SourceUnavailable { store: StoreKind, reason: String },

    #[error("Item '{text}' not found in {store} list")]
    ItemNotFound { store: StoreKind, text: String },

    #[error("{op} failed on {store} list: {reason}")]
    MutationFailed {
        store: StoreKind,
        op: &'static str,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Stage of a run an error belongs to, reported to the user on abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Auth,
    Read,
    Mutation,
    Config,
    State,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Auth => "auth",
            Phase::Read => "read",
            Phase::Mutation => "mutation",
            Phase::Config => "config",
            Phase::State => "state",
        };
        f.write_str(name)
    }
}

impl SyncError {
    pub fn unavailable(store: StoreKind, reason: impl fmt::Display) -> Self {
        SyncError::SourceUnavailable {
            store,
            reason: reason.to_string(),
        }
    }

    pub fn mutation(store: StoreKind, op: &'static str, reason: impl fmt::Display) -> Self {
        SyncError::MutationFailed {
            store,
            op,
            reason: reason.to_string(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            SyncError::AuthExpired(_) | SyncError::InvalidCredentials(_) | SyncError::Auth(_) => {
                Phase::Auth
            }
            SyncError::SourceUnavailable { .. } => Phase::Read,
            SyncError::ItemNotFound { .. } | SyncError::MutationFailed { .. } => Phase::Mutation,
            SyncError::Config(_) => Phase::Config,
            SyncError::State(_) | SyncError::Io(_) | SyncError::Json(_) => Phase::State,
            SyncError::Http(_) => Phase::Read,
        }
    }

    /// Deleting an item that is already gone is expected with stale snapshots.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::ItemNotFound { .. })
    }
}
