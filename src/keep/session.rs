//! Authenticated session against the cloud account

use tracing::{debug, info, warn};

use super::auth::SessionProvider;
use crate::error::{Result, SyncError};
use crate::state::TokenStore;

/// An authenticated session
#[derive(Clone)]
pub struct Session {
    email: String,
    master_token: String,
    access_token: String,
}

impl Session {
    pub fn new(
        email: impl Into<String>,
        master_token: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            master_token: master_token.into(),
            access_token: access_token.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Token to cache so the next run can resume without a password.
    pub fn current_token(&self) -> &str {
        &self.master_token
    }

    /// Short-lived bearer for the notes API.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

// Tokens stay out of debug output
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Resume from the cached token when there is one, otherwise log in.
///
/// A rejected cached token falls back to a password login. After a login the
/// new token is written to `tokens` before returning.
pub async fn establish(
    provider: &dyn SessionProvider,
    email: &str,
    password: Option<&str>,
    tokens: &TokenStore,
) -> Result<Session> {
    if let Some(cached) = tokens.load()? {
        match provider.resume(email, &cached).await {
            Ok(session) => {
                debug!("Resumed session from cached token");
                return Ok(session);
            }
            Err(SyncError::AuthExpired(reason)) => {
                warn!("Cached token rejected ({}), logging in again", reason);
            }
            Err(e) => return Err(e),
        }
    }

    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| SyncError::InvalidCredentials("no cached token and no password".into()))?;

    let session = provider.login(email, password).await?;
    tokens.save(session.current_token())?;
    info!("Logged in as {}", email);
    Ok(session)
}
