//! Watch configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.errifier/
//!   config.yaml   (optional; every key has a default)
//!   daemon.sock   (created by the daemon)
//! ```
//!
//! # API pattern
//!
//! - `load_at(home)`: explicit home; used in tests with `TempDir`
//! - `load()`: derives home from `dirs::home_dir()`, delegates to `load_at`
//!
//! Environment variables override the file: `ERRIFIER_CAPACITY`,
//! `ERRIFIER_REOPEN_INTERVAL_MS`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 512;
pub const DEFAULT_REOPEN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TAIL_LINES: usize = 5;

pub const CAPACITY_ENV: &str = "ERRIFIER_CAPACITY";
pub const REOPEN_INTERVAL_ENV: &str = "ERRIFIER_REOPEN_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Maximum number of live watches.
    pub capacity: usize,
    /// How often a detached task retries opening its path.
    pub reopen_interval_ms: u64,
    /// Line count used by tail requests that do not name one.
    pub tail_lines: usize,
    /// Whether the daemon raises desktop notifications.
    pub desktop_notifications: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            reopen_interval_ms: DEFAULT_REOPEN_INTERVAL_MS,
            tail_lines: DEFAULT_TAIL_LINES,
            desktop_notifications: true,
        }
    }
}

impl WatchConfig {
    /// Load `<home>/.errifier/config.yaml`, falling back to defaults when the
    /// file is absent, then apply environment overrides and validate.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let path = config_path_at(home);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&contents)
                    .map_err(|source| ConfigError::Parse { path, source })?
            }
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&home()?)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(CAPACITY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => self.capacity = capacity,
                Err(_) => tracing::warn!(value = %raw, "ignoring unparseable {CAPACITY_ENV}"),
            }
        }
        if let Some(raw) = lookup(REOPEN_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.reopen_interval_ms = ms,
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring unparseable {REOPEN_INTERVAL_ENV}")
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.reopen_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reopen_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reopen_interval(&self) -> Duration {
        Duration::from_millis(self.reopen_interval_ms)
    }
}

/// `<home>/.errifier/`
pub fn errifier_root(home: &Path) -> PathBuf {
    home.join(".errifier")
}

/// `<home>/.errifier/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    errifier_root(home).join("config.yaml")
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
