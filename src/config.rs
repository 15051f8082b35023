use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::util;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./telemetry.db")
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub api: HttpConfig,
    pub hub: HubConfig,
    pub relay: RelayConfig,
    pub scheduler: SchedulerConfig,
}

/// HTTP / WebSocket surface
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: util::DEFAULT_BIND_ADDR,
            enable_cors: true,
        }
    }
}

/// Broadcast hub limits
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Concurrent subscribers accepted before new ones are refused
    pub max_subscribers: usize,

    /// Messages queued per subscriber before it is evicted as too slow
    pub subscriber_buffer: usize,

    /// WebSocket ping period; a socket silent for three periods is closed
    pub keepalive_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 256,
            subscriber_buffer: 64,
            keepalive_secs: 10,
        }
    }
}

impl HubConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Deadline for a single storage write
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Daily aggregation trigger, evaluated in UTC
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub hour: u32,
    pub minute: u32,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hour: 1,
            minute: 0,
            enabled: true,
        }
    }
}

impl Config {
    /// Apply `TELEMETRY_BIND_ADDR` and `TELEMETRY_DB_PATH` on top of the file
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(addr) = util::get_bind_addr() {
            trace!("bind address overridden from environment: {addr}");
            self.api.bind_addr = addr;
        }

        if let Some(db_path) = util::get_db_path() {
            trace!("database path overridden from environment: {}", db_path.display());
            self.storage = StorageConfig::Sqlite { path: db_path };
        }

        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
