//! Config file parsing for `~/.config/benibook/config.toml`.
//!
//! Environment variables override the file:
//! - `BENIBOOK_APP_KEY`: Calil application key
//! - `BENIBOOK_CALIL_HOST`: availability service host
//! - `BENIBOOK_OPENBD_HOST`: metadata service host

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::availability::{self, SearchRequest};
use crate::error::ConfigError;
use crate::lookup::openbd;

pub const ENV_APP_KEY: &str = "BENIBOOK_APP_KEY";
pub const ENV_CALIL_HOST: &str = "BENIBOOK_CALIL_HOST";
pub const ENV_OPENBD_HOST: &str = "BENIBOOK_OPENBD_HOST";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    pub app_key: Option<String>,
    #[serde(default = "default_calil_host")]
    pub host: String,
    /// System used when a search names none.
    pub default_system: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_calil_host() -> String {
    availability::DEFAULT_HOST.to_string()
}
fn default_poll_interval_ms() -> u64 {
    availability::DEFAULT_POLL_INTERVAL.as_millis() as u64
}
fn default_max_rounds() -> u32 {
    availability::DEFAULT_MAX_ROUNDS
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            app_key: None,
            host: default_calil_host(),
            default_system: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl AvailabilityConfig {
    /// Build a search request from config. Missing values are left empty so
    /// that [`SearchRequest::validate`] reports them.
    pub fn request(&self, isbn: &str, system_id: Option<&str>) -> SearchRequest {
        let system_id = system_id
            .map(String::from)
            .or_else(|| self.default_system.clone())
            .unwrap_or_default();
        SearchRequest::new(self.app_key.clone().unwrap_or_default(), isbn, system_id)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_max_rounds(self.max_rounds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_openbd_host")]
    pub host: String,
}

fn default_openbd_host() -> String {
    openbd::DEFAULT_HOST.to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self { host: default_openbd_host() }
    }
}

impl AppConfig {
    /// Apply environment overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(ENV_APP_KEY).filter(|v| !v.is_empty()) {
            self.availability.app_key = Some(key);
        }
        if let Some(host) = lookup(ENV_CALIL_HOST).filter(|v| !v.is_empty()) {
            self.availability.host = host;
        }
        if let Some(host) = lookup(ENV_OPENBD_HOST).filter(|v| !v.is_empty()) {
            self.metadata.host = host;
        }
        self
    }

    /// Set a value by dot-separated key, e.g. `availability.app_key`.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key.split_once('.') {
            Some(("availability", sub)) => match sub {
                "app_key" => self.availability.app_key = Some(value.to_string()),
                "host" => self.availability.host = value.to_string(),
                "default_system" => self.availability.default_system = Some(value.to_string()),
                "poll_interval_ms" => {
                    self.availability.poll_interval_ms = value.parse().map_err(|_| invalid())?
                }
                "max_rounds" => self.availability.max_rounds = value.parse().map_err(|_| invalid())?,
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            },
            Some(("metadata", "host")) => self.metadata.host = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

/// Load config from the default path, then apply environment overrides.
/// A missing or unreadable file yields the defaults.
pub fn load_config() -> AppConfig {
    let cfg = match config_path() {
        Some(path) if path.exists() => load_config_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
            AppConfig::default()
        }),
        _ => AppConfig::default(),
    };
    cfg.with_env()
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_config(cfg: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("benibook");
        p.push("config.toml");
        p
    })
}
