//! Account authentication for the notes service
//!
//! Speaks the Android account-manager protocol: a password login yields a
//! long-lived master token, and the master token is exchanged for a
//! short-lived OAuth bearer scoped to the notes API on every run.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::Client;
use rsa::{BigUint, Oaep, RsaPublicKey};
use sha1::{Digest, Sha1};
use tracing::debug;

use super::session::Session;
use crate::error::{Result, SyncError};

pub const AUTH_URL: &str = "https://android.clients.google.com/auth";

/// Public key the account service publishes for password encryption.
const SERVICE_PUBLIC_KEY: &str = "AAAAgMom/1a/v0lblO2Ubrt60J2gcuXSljGFQXgcyZWveWLEwo6prwgi3iJIZdodyhKZQrNWp5nKJ3srRXcUW+F1BD3baEVGcmEgqaLZUNBjm057pKRI16kB0YppeGx5qIQ5QjKzsR8ETQbKLNWgRY0QRNVz34kMJR3P/LgHax/6rmf5AAAAAwEAAQ==";

const CLIENT_SIG: &str = "38918a453d07199354f8b19af05ec6562ced5788";
const KEEP_APP: &str = "com.google.android.keep";
const KEEP_SCOPES: &str =
    "oauth2:https://www.googleapis.com/auth/memento https://www.googleapis.com/auth/reminders";
const USER_AGENT: &str = "GoogleAuth/1.4";

/// Creates sessions for the cloud account
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Reuse a cached master token. Fails with `AuthExpired` when rejected.
    async fn resume(&self, email: &str, master_token: &str) -> Result<Session>;

    /// Log in with the primary credentials. Fails with `InvalidCredentials`.
    async fn login(&self, email: &str, password: &str) -> Result<Session>;
}

/// Session provider backed by the account service
pub struct GoogleAuth {
    client: Client,
    auth_url: String,
    android_id: String,
    key: RsaPublicKey,
    key_bytes: Vec<u8>,
}

impl GoogleAuth {
    pub fn new(android_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let key_bytes = STANDARD
            .decode(SERVICE_PUBLIC_KEY)
            .map_err(|e| SyncError::Auth(format!("bad service key: {}", e)))?;
        let key = parse_public_key(&key_bytes)?;

        Ok(Self {
            client,
            auth_url: AUTH_URL.to_string(),
            android_id: android_id.into(),
            key,
            key_bytes,
        })
    }

    /// Point at a different auth endpoint.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .post(&self.auth_url)
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("auth endpoint unreachable: {}", e)))?;

        // Errors come back as `Error=...` lines with a 4xx status
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Auth(format!("auth response unreadable: {}", e)))?;
        Ok(parse_auth_response(&body))
    }

    async fn master_login(&self, email: &str, password: &str) -> Result<String> {
        let encrypted = encrypt_password(&self.key, &self.key_bytes, email, password)?;
        let form = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", email),
            ("has_permission", "1"),
            ("add_account", "1"),
            ("EncryptedPasswd", encrypted.as_str()),
            ("service", "ac2dm"),
            ("source", "android"),
            ("androidId", self.android_id.as_str()),
            ("device_country", "us"),
            ("operatorCountry", "us"),
            ("lang", "en"),
            ("sdk_version", "17"),
            ("client_sig", CLIENT_SIG),
            ("callerSig", CLIENT_SIG),
            ("droidguard_results", "dummy123"),
        ];

        let mut response = self.post(&form).await?;
        if let Some(token) = response.remove("Token") {
            return Ok(token);
        }
        match response.remove("Error") {
            Some(error) if error == "BadAuthentication" => Err(SyncError::InvalidCredentials(error)),
            Some(error) => Err(SyncError::Auth(error)),
            None => Err(SyncError::Auth("login response carried no token".into())),
        }
    }

    async fn exchange(&self, email: &str, master_token: &str) -> Result<String> {
        let form = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", email),
            ("has_permission", "1"),
            ("EncryptedPasswd", master_token),
            ("service", KEEP_SCOPES),
            ("source", "android"),
            ("androidId", self.android_id.as_str()),
            ("app", KEEP_APP),
            ("client_sig", CLIENT_SIG),
            ("device_country", "us"),
            ("operatorCountry", "us"),
            ("lang", "en"),
            ("sdk_version", "17"),
        ];

        let mut response = self.post(&form).await?;
        if let Some(auth) = response.remove("Auth") {
            return Ok(auth);
        }
        match response.remove("Error") {
            Some(error) if error == "BadAuthentication" => Err(SyncError::AuthExpired(error)),
            Some(error) => Err(SyncError::Auth(error)),
            None => Err(SyncError::Auth("token exchange returned no bearer".into())),
        }
    }
}

#[async_trait]
impl SessionProvider for GoogleAuth {
    async fn resume(&self, email: &str, master_token: &str) -> Result<Session> {
        let access_token = self.exchange(email, master_token).await?;
        debug!("Exchanged master token for bearer");
        Ok(Session::new(email, master_token, access_token))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let master_token = self.master_login(email, password).await?;
        debug!("Obtained master token");
        let access_token = self.exchange(email, &master_token).await.map_err(|e| match e {
            // A fresh token should never be rejected
            SyncError::AuthExpired(reason) => SyncError::Auth(reason),
            other => other,
        })?;
        Ok(Session::new(email, master_token, access_token))
    }
}

/// Device id sent with every auth request, stable per account.
pub fn default_android_id(email: &str) -> String {
    let digest = Sha1::digest(email.to_lowercase().as_bytes());
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Split `Key=Value` lines.
pub fn parse_auth_response(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Key layout: be32 modulus length, modulus, be32 exponent length, exponent.
fn parse_public_key(bytes: &[u8]) -> Result<RsaPublicKey> {
    fn field(bytes: &[u8], at: usize) -> Option<(&[u8], usize)> {
        let len_bytes: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        let value = bytes.get(at + 4..at + 4 + len)?;
        Some((value, at + 4 + len))
    }

    let malformed = || SyncError::Auth("malformed service key".into());
    let (modulus, next) = field(bytes, 0).ok_or_else(malformed)?;
    let (exponent, _) = field(bytes, next).ok_or_else(malformed)?;

    RsaPublicKey::new(BigUint::from_bytes_be(modulus), BigUint::from_bytes_be(exponent))
        .map_err(|e| SyncError::Auth(format!("invalid service key: {}", e)))
}

/// `0x00 || sha1(key)[..4] || RSA-OAEP(email \0 password)`, URL-safe base64.
fn encrypt_password(
    key: &RsaPublicKey,
    key_bytes: &[u8],
    email: &str,
    password: &str,
) -> Result<String> {
    let plain = format!("{}\u{0}{}", email, password);
    let mut rng = rand::thread_rng();
    let encrypted = key
        .encrypt(&mut rng, Oaep::new::<Sha1>(), plain.as_bytes())
        .map_err(|e| SyncError::Auth(format!("password encryption failed: {}", e)))?;

    let hash = Sha1::digest(key_bytes);
    let mut signature = Vec::with_capacity(5 + encrypted.len());
    signature.push(0);
    signature.extend_from_slice(&hash[..4]);
    signature.extend_from_slice(&encrypted);
    Ok(URL_SAFE.encode(signature))
}
