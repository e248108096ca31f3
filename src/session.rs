//! Credential storage and the session context shared by the HTTP client
//! and the pages.
//!
//! The access and refresh credentials are persisted with fixed expirations,
//! standing in for the two cookies of the web client. Stores are re-read on
//! every request; nothing is cached in memory between calls.

use crate::journal::Journal;
use crate::navigation::{Navigator, Route};
use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// How long each credential is kept after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn from_days(access_days: i64, refresh_days: i64) -> Self {
        Self {
            access: Duration::days(access_days),
            refresh: Duration::days(refresh_days),
        }
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self::from_days(1, 7)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Persisted credential pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub access: Option<StoredCredential>,
    #[serde(default)]
    pub refresh: Option<StoredCredential>,
}

impl Credentials {
    pub fn issue(access: &str, refresh: &str, lifetimes: TokenLifetimes, now: DateTime<Utc>) -> Self {
        Self {
            access: Some(StoredCredential {
                value: access.to_string(),
                expires_at: now + lifetimes.access,
            }),
            refresh: Some(StoredCredential {
                value: refresh.to_string(),
                expires_at: now + lifetimes.refresh,
            }),
        }
    }

    /// The access credential, unless missing or expired
    pub fn live_access(&self, now: DateTime<Utc>) -> Option<&str> {
        self.access
            .as_ref()
            .filter(|c| c.is_live(now))
            .map(|c| c.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Where credentials live between requests.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Credentials>;
    fn save(&self, credentials: &Credentials) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file store, one file per gateway.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `base_url` inside `dir`, keyed like a cookie jar by origin.
    pub fn for_gateway(dir: &Path, base_url: &str) -> Self {
        Self::new(session_file(dir, base_url))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let credentials = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt credential file {}", self.path.display()))?;
        Ok(credentials)
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(credentials)?;
        let mut file = open_private(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Truncate or create `path` readable by the owner only, before any
/// content is written. A file left with wider permissions is narrowed too.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

/// In-process store; credentials last as long as the process (`--ephemeral`).
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Credentials> {
        Ok(self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = credentials.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&Credentials::default())
    }
}

/// `<dir>/<first 16 hex chars of sha256(base_url)>.json`
pub fn session_file(dir: &Path, base_url: &str) -> PathBuf {
    let digest = Sha256::digest(base_url.trim_end_matches('/').as_bytes());
    let hex = format!("{:x}", digest);
    dir.join(format!("{}.json", &hex[..16]))
}

/// Read the `exp` claim of a JWT without verifying it.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Snapshot of the stored session for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub access_expires: Option<DateTime<Utc>>,
    pub refresh_expires: Option<DateTime<Utc>>,
    /// Expiry claimed by the access token itself, when it is a JWT
    pub access_claims_expiry: Option<DateTime<Utc>>,
}

/// Explicit session state: credential store, navigator and journal.
///
/// Passed to the HTTP client and, through it, to every page.
pub struct SessionContext {
    store: Box<dyn CredentialStore>,
    navigator: Navigator,
    lifetimes: TokenLifetimes,
    journal: Option<Mutex<Journal>>,
}

impl SessionContext {
    pub fn new(store: Box<dyn CredentialStore>, lifetimes: TokenLifetimes) -> Self {
        Self {
            store,
            navigator: Navigator::default(),
            lifetimes,
            journal: None,
        }
    }

    /// Session backed by a memory store with default lifetimes
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCredentialStore::new()), TokenLifetimes::default())
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(Mutex::new(journal));
        self
    }

    pub fn with_start(mut self, route: Route) -> Self {
        self.navigator = Navigator::new(route);
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Navigate and journal the move. No-op if `to` is already current.
    pub fn navigate(&self, to: Route) {
        if let Some(from) = self.navigator.navigate(to) {
            tracing::debug!(from = %from, to = %to, "navigate");
            self.record(|j| j.navigation(&from.path(), &to.path()));
        }
    }

    /// Access credential for the next request. Read fresh from the store.
    pub fn access_token(&self) -> Option<String> {
        match self.store.load() {
            Ok(credentials) => credentials.live_access(Utc::now()).map(str::to_string),
            Err(e) => {
                tracing::warn!("credential store unreadable: {:#}", e);
                None
            }
        }
    }

    pub fn store_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        let credentials = Credentials::issue(access, refresh, self.lifetimes, Utc::now());
        self.store.save(&credentials)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    pub fn credentials(&self) -> Result<Credentials> {
        self.store.load()
    }

    pub fn status(&self) -> Result<SessionStatus> {
        let credentials = self.store.load()?;
        let now = Utc::now();
        let live_access = credentials.access.as_ref().filter(|c| c.is_live(now));
        let live_refresh = credentials.refresh.as_ref().filter(|c| c.is_live(now));
        Ok(SessionStatus {
            access_expires: live_access.map(|c| c.expires_at),
            refresh_expires: live_refresh.map(|c| c.expires_at),
            access_claims_expiry: live_access.and_then(|c| token_expiry(&c.value)),
        })
    }

    /// Append to the journal, if one is attached. Journal failures only warn.
    pub fn record<F>(&self, write: F)
    where
        F: FnOnce(&mut Journal) -> Result<()>,
    {
        if let Some(journal) = &self.journal {
            let mut journal = journal.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = write(&mut journal) {
                tracing::warn!("journal write failed: {:#}", e);
            }
        }
    }
}
