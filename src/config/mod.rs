//! Runtime configuration loaded from `~/.ordersync/config.toml`.
//!
//! The file is optional; every field falls back to its `Default` value.

mod loader;

pub use loader::{load_config, load_config_from};

use crate::utils::ordersync_home;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default Phase-A displacement base for reorders.
pub const DEFAULT_REORDER_OFFSET: i64 = 10_000;

/// Default whole-operation timeout for a reorder, in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Default per-receiver buffer of the store change channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

fn default_offset() -> i64 {
    DEFAULT_REORDER_OFFSET
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

fn default_serialize_reorders() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// `[reorder]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReorderSettings {
    /// Base of the temporary order range used while displacing siblings.
    #[serde(default = "default_offset")]
    pub offset: i64,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Hold a per-collection lock for the duration of each reorder.
    #[serde(default = "default_serialize_reorders")]
    pub serialize_reorders: bool,
}

impl Default for ReorderSettings {
    fn default() -> Self {
        Self {
            offset: default_offset(),
            operation_timeout_ms: default_operation_timeout_ms(),
            serialize_reorders: default_serialize_reorders(),
        }
    }
}

impl ReorderSettings {
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// `[feed]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// `[storage]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StorageSettings {
    /// Configured data directory, or `~/.ordersync/data`.
    #[must_use]
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| ordersync_home().join("data"))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderSyncConfig {
    #[serde(default)]
    pub reorder: ReorderSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Resolve the canonical path for the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    ordersync_home().join("config.toml")
}
