//! Cloud notes account: authentication, session handling and the list store

pub mod auth;
pub mod notes;
pub mod session;

use std::time::Duration;

pub use auth::{GoogleAuth, SessionProvider};
pub use notes::{KeepClient, KeepList};
pub use session::{establish, Session};

/// Request timeout for the account and notes endpoints.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
