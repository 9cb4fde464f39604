//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and TOML loading
//! - [`validation`]: startup checks that collect every problem at once
//!
//! [`LiveConfig`] holds the current snapshot. `@reload_conf` builds a new
//! snapshot from the same file and swaps it in; readers holding the old
//! `Arc<Config>` keep it until they drop it.

mod types;
mod validation;

pub use types::{
    BusConfig, Config, ConfigError, ConsoleConfig, DatabaseConfig, RealtimeConfig, ServerConfig,
    WebConfig,
};
pub use validation::{ValidationError, validate};

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a reload was refused. The previous snapshot stays active.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Hot-swappable configuration snapshot.
pub struct LiveConfig {
    path: PathBuf,
    current: RwLock<Arc<Config>>,
}

impl LiveConfig {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.current.read())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read, validate and swap. Returns the new snapshot.
    pub fn reload(&self) -> Result<Arc<Config>, ReloadError> {
        let config = Config::load(&self.path)?;
        validate(&config).map_err(ReloadError::Invalid)?;
        let config = Arc::new(config);
        *self.current.write() = Arc::clone(&config);
        Ok(config)
    }
}
