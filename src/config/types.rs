//! Core configuration types and loading.

use bee_proto::RuleSpec;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Message bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Persistence binding handed to handlers.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Console transport.
    #[serde(default)]
    pub console: ConsoleConfig,
    /// Optional web (HTTP) transport.
    pub web: Option<WebConfig>,
    /// Optional realtime (websocket) transport.
    pub realtime: Option<RealtimeConfig>,
    /// Rules that admit any session, checked before session grants.
    #[serde(default)]
    pub free_actions: Vec<RuleSpec>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name, used in logs and the `system.Info.ping` reply.
    pub name: String,
    /// Start with verbose module resolution logging (toggled by `@cdebug`).
    #[serde(default)]
    pub debug: bool,
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Channel prefix; topics are published as `{prefix}-{topic}`.
    #[serde(default = "default_bus_prefix")]
    pub prefix: String,
    /// Buffered events per subscriber before the slowest one starts lagging.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            prefix: default_bus_prefix(),
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_prefix() -> String {
    "bee".to_string()
}

fn default_bus_capacity() -> usize {
    1024
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection url, e.g. `sqlite://bee.db?mode=rwc`.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

/// Console transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Read commands from stdin.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Shortcut alias file (YAML).
    pub shortcuts: Option<PathBuf>,
    /// Directory holding `.cmd` files for `@run` and `@cmdtocsv`.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shortcuts: None,
            run_dir: default_run_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("run")
}

/// Web transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Listen address for command requests and `/metrics`.
    pub address: SocketAddr,
    /// Shortcut alias file (YAML).
    pub shortcuts: Option<PathBuf>,
}

/// Realtime (websocket) transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Listen address.
    pub address: SocketAddr,
    /// Allowed `Origin` values; empty allows every origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    /// Shortcut alias file (YAML).
    pub shortcuts: Option<PathBuf>,
}
