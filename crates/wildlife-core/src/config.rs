//! Configuration types.
//!
//! Configuration lives in `config.toml` under the platform config directory.
//! A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Runtime configuration for the wildlife browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Exclusion and wishlist patterns.
    #[serde(default)]
    pub filters: FilterSettings,

    /// Upper bound for a single record fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            filters: FilterSettings::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl BrowserConfig {
    /// Load the configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load the configuration from a file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Write the configuration to a file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Fetch timeout as a duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Pattern lists maintained by the user.
///
/// Each entry is a case-insensitive regular expression matched against
/// resolved creature names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Names hidden from every listing.
    #[serde(default)]
    pub excluded_wildlife: Vec<String>,

    /// Names kept when the wishlist filter is on.
    #[serde(default)]
    pub wishlist_wildlife: Vec<String>,
}

impl FilterSettings {
    /// Build settings from newline-separated lists. Blank lines are dropped.
    pub fn from_lines(excluded: &str, wishlist: &str) -> Self {
        Self {
            excluded_wildlife: split_lines(excluded),
            wishlist_wildlife: split_lines(wishlist),
        }
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wildlife"))
}

/// Get the path to config.toml.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}
