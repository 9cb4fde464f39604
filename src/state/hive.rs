//! Shared daemon state.

use super::SessionTable;
use crate::bus::MessageBus;
use crate::config::{Config, LiveConfig};
use crate::db::Persistence;
use crate::handlers::ModuleRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything a handler can reach.
pub struct Hive {
    pub bus: Arc<dyn MessageBus>,
    pub sessions: Arc<SessionTable>,
    pub db: Persistence,
    pub config: Arc<LiveConfig>,
    pub registry: Arc<ModuleRegistry>,
    pub started: DateTime<Utc>,
}

impl Hive {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        db: Persistence,
        config: Arc<LiveConfig>,
        registry: Arc<ModuleRegistry>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionTable::new(Arc::clone(&bus))),
            bus,
            db,
            config,
            registry,
            started: Utc::now(),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.snapshot()
    }

    /// Time since startup, formatted `HH:MM:SS` (days prefixed when non-zero).
    pub fn uptime(&self) -> String {
        format_uptime((Utc::now() - self.started).num_seconds())
    }
}

pub(crate) fn format_uptime(secs: i64) -> String {
    let secs = secs.max(0);
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{days}d {clock}")
    } else {
        clock
    }
}
