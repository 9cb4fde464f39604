//! Configuration validation.
//!
//! Validates configuration at startup (and on `@reload_conf`) to catch common
//! errors early.

use super::Config;
use bee_proto::{PermissionRule, RuleError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("bus.prefix must not be empty")]
    EmptyBusPrefix,
    #[error("bus.capacity must be greater than zero")]
    ZeroBusCapacity,
    #[error("free_actions[{index}] is invalid: {source}")]
    InvalidFreeRule {
        index: usize,
        #[source]
        source: RuleError,
    },
    #[error("{transport}.shortcuts does not exist: {}", .path.display())]
    ShortcutsNotFound {
        transport: &'static str,
        path: PathBuf,
    },
    #[error("console.run_dir is not a directory: {}", .0.display())]
    RunDirNotFound(PathBuf),
    #[error("web.address and realtime.address must differ")]
    AddressConflict,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    if config.bus.prefix.is_empty() {
        errors.push(ValidationError::EmptyBusPrefix);
    }
    if config.bus.capacity == 0 {
        errors.push(ValidationError::ZeroBusCapacity);
    }

    for (index, spec) in config.free_actions.iter().enumerate() {
        if let Err(source) = PermissionRule::new(spec.clone()) {
            errors.push(ValidationError::InvalidFreeRule { index, source });
        }
    }

    let shortcut_files = [
        ("console", config.console.shortcuts.as_deref()),
        ("web", config.web.as_ref().and_then(|w| w.shortcuts.as_deref())),
        (
            "realtime",
            config.realtime.as_ref().and_then(|r| r.shortcuts.as_deref()),
        ),
    ];
    for (transport, path) in shortcut_files {
        if let Some(path) = path
            && !path.is_file()
        {
            errors.push(ValidationError::ShortcutsNotFound {
                transport,
                path: path.to_path_buf(),
            });
        }
    }

    if config.console.enabled && !Path::new(&config.console.run_dir).is_dir() {
        errors.push(ValidationError::RunDirNotFound(config.console.run_dir.clone()));
    }

    if let (Some(web), Some(realtime)) = (&config.web, &config.realtime)
        && web.address == realtime.address
        && web.address.port() != 0
    {
        errors.push(ValidationError::AddressConflict);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
