// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration management.
//!
//! Configuration is stored in `.tally/config.toml` and includes:
//! - `[remote]`: base url of the REST store, how to find the bearer token,
//!   and the per-call timeout
//! - `[sync]`: retry ceiling, drain batch size, and the watch interval
//!
//! Every key has a default, so an empty file is a valid local-only config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_core::EngineConfig;

use crate::error::{Error, Result};

pub const WORK_DIR_NAME: &str = ".tally";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "cache.db";
pub const LOG_FILE_NAME: &str = "tally.log";
const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Project configuration stored in `.tally/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote store (optional - if absent, every write stays queued).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Where the REST store lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API base, e.g. `https://api.example.com/v1`. Collections hang off it
    /// as `/accounts`, `/categories`, `/transactions`.
    pub url: String,
    /// Inline bearer token. The environment variable wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Environment variable holding the bearer token (default: `TALLY_TOKEN`).
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Upper bound on a single request in milliseconds (default: 10000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Queue replay tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attempts before an entry is marked failed (default: 5).
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    /// Entries claimed at a time during a drain (default: 20).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between drains and connectivity probes in `sync --watch`
    /// (default: 30).
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            retry_ceiling: default_retry_ceiling(),
            batch_size: default_batch_size(),
            drain_interval_secs: default_drain_interval_secs(),
        }
    }
}

fn default_token_env() -> String {
    "TALLY_TOKEN".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_ceiling() -> u32 {
    5
}

fn default_batch_size() -> usize {
    20
}

fn default_drain_interval_secs() -> u64 {
    30
}

impl RemoteConfig {
    /// Creates a remote section for `url` with default token lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRemoteUrl`] unless the url is http(s).
    pub fn new(url: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/');
        let host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or_default();
        if host.is_empty() {
            return Err(Error::InvalidRemoteUrl(url.to_string()));
        }
        Ok(RemoteConfig {
            url: url.to_string(),
            token: None,
            token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Creates a config, optionally pointing at a remote store.
    pub fn new(remote_url: Option<&str>) -> Result<Self> {
        let remote = remote_url.map(RemoteConfig::new).transpose()?;
        Ok(Config {
            remote,
            sync: SyncConfig::default(),
        })
    }

    /// Loads configuration from the given `.tally/` directory.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Saves configuration to the given `.tally/` directory.
    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Returns the remote URL if configured.
    pub fn remote_url(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.url.as_str())
    }

    /// Engine tunables derived from `[sync]` and `[remote]`.
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            retry_ceiling: self.sync.retry_ceiling.max(1),
            batch_size: self.sync.batch_size.max(1),
            call_timeout: self
                .remote
                .as_ref()
                .map(RemoteConfig::timeout)
                .unwrap_or(defaults.call_timeout),
            ..defaults
        }
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.sync.drain_interval_secs.max(1))
    }
}

/// Find the .tally directory by walking up from the current directory
pub fn find_work_dir() -> Result<PathBuf> {
    find_work_dir_from(&std::env::current_dir()?)
}

/// Find the .tally directory by walking up from `start`
pub fn find_work_dir_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let work_dir = current.join(WORK_DIR_NAME);
        if work_dir.is_dir() {
            return Ok(work_dir);
        }
        if !current.pop() {
            return Err(Error::NotInitialized);
        }
    }
}

pub fn get_db_path(work_dir: &Path) -> PathBuf {
    work_dir.join(DB_FILE_NAME)
}

pub fn get_log_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOG_FILE_NAME)
}

/// Initialize a new .tally directory at the given path
pub fn init_work_dir(path: &Path, config: &Config) -> Result<PathBuf> {
    let work_dir = path.join(WORK_DIR_NAME);

    if work_dir.exists() {
        return Err(Error::AlreadyInitialized(work_dir.display().to_string()));
    }

    fs::create_dir_all(&work_dir)?;
    config.save(&work_dir)?;

    Ok(work_dir)
}

/// Write a .gitignore file to the work directory.
///
/// The cache and log are per-device state; only the config is shareable.
pub fn write_gitignore(work_dir: &Path) -> Result<()> {
    let content = format!(
        "# Per-device cache and operation queue\n{DB_FILE_NAME}\n{DB_FILE_NAME}-wal\n{DB_FILE_NAME}-shm\n\n# Logs\n{LOG_FILE_NAME}\n"
    );
    fs::write(work_dir.join(GITIGNORE_FILE_NAME), content)?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
