use crate::session::TokenLifetimes;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost/api/";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ACCESS_TTL_DAYS: i64 = 1;
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Directory under the home (user config) or working directory (project config)
const CONFIG_DIR: &str = ".sabj";

/// A validation error in the configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{field}]: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Where the gateway lives and how long to wait for it
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// Credential storage
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub access_ttl_days: Option<i64>,
    #[serde(default)]
    pub refresh_ttl_days: Option<i64>,
}

impl SessionConfig {
    pub fn dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => expand_home(dir),
            None => sabj_home().join("sessions"),
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes::from_days(
            self.access_ttl_days.unwrap_or(DEFAULT_ACCESS_TTL_DAYS),
            self.refresh_ttl_days.unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
        )
    }
}

/// Activity journal
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl JournalConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => expand_home(dir),
            None => sabj_home().join("journal"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.sabj/config.local.toml) > project (.sabj/config.toml) > user (~/.sabj/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_layers(dirs::home_dir().as_deref(), Path::new("."))
    }

    /// Layered load with explicit home and project roots
    pub fn load_layers(home: Option<&Path>, project: &Path) -> Result<Self> {
        let mut config = Self::default();

        let mut layers = Vec::new();
        if let Some(home) = home {
            layers.push(home.join(CONFIG_DIR).join("config.toml"));
        }
        layers.push(project.join(CONFIG_DIR).join("config.toml"));
        layers.push(project.join(CONFIG_DIR).join("config.local.toml"));

        for path in layers {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config layer");
                config.merge(Self::load_from(&path)?);
            }
        }
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one; values set in `other` win.
    pub fn merge(&mut self, other: Config) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.gateway.base_url, other.gateway.base_url);
        take(&mut self.gateway.timeout_ms, other.gateway.timeout_ms);
        take(&mut self.session.dir, other.session.dir);
        take(&mut self.session.access_ttl_days, other.session.access_ttl_days);
        take(&mut self.session.refresh_ttl_days, other.session.refresh_ttl_days);
        take(&mut self.journal.enabled, other.journal.enabled);
        take(&mut self.journal.dir, other.journal.dir);
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let url = self.gateway.base_url();
        let host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"));
        match host {
            Some(rest) if !rest.trim_start_matches('/').is_empty() => {}
            Some(_) => errors.push(ValidationError::new("gateway.base_url", "Missing host")),
            None => errors.push(ValidationError::new(
                "gateway.base_url",
                format!("Expected an http(s) URL, got '{}'", url),
            )),
        }

        if self.gateway.timeout_ms == Some(0) {
            errors.push(ValidationError::new("gateway.timeout_ms", "Must be greater than 0"));
        }

        let access = self.session.access_ttl_days.unwrap_or(DEFAULT_ACCESS_TTL_DAYS);
        let refresh = self.session.refresh_ttl_days.unwrap_or(DEFAULT_REFRESH_TTL_DAYS);
        if access <= 0 {
            errors.push(ValidationError::new("session.access_ttl_days", "Must be greater than 0"));
        }
        if refresh <= 0 {
            errors.push(ValidationError::new("session.refresh_ttl_days", "Must be greater than 0"));
        }
        if access > 0 && refresh > 0 && refresh < access {
            errors.push(ValidationError::new(
                "session.refresh_ttl_days",
                format!("Must be at least access_ttl_days ({})", access),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `~/.sabj`, or `./.sabj` when there is no home directory
fn sabj_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
