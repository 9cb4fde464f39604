//! Shortcut tables per transport.

use crate::config::Config;
use crate::state::Transport;
use bee_proto::{ShortcutError, ShortcutTable};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One shortcut table per transport, swapped whole on reload.
pub struct ShortcutSet {
    tables: [RwLock<Arc<ShortcutTable>>; 3],
}

impl ShortcutSet {
    /// Tables with no aliases.
    pub fn empty() -> Self {
        Self {
            tables: std::array::from_fn(|_| RwLock::new(Arc::new(ShortcutTable::empty()))),
        }
    }

    /// Load every transport's configured file.
    pub fn load(config: &Config) -> Result<Self, ShortcutError> {
        let set = Self::empty();
        for transport in Transport::ALL {
            if let Some(path) = configured_path(config, transport) {
                let table = ShortcutTable::load(path)?;
                info!(%transport, path = %path.display(), aliases = table.len(), "Shortcuts loaded");
                set.set(transport, table);
            }
        }
        Ok(set)
    }

    fn index(transport: Transport) -> usize {
        match transport {
            Transport::Console => 0,
            Transport::Web => 1,
            Transport::Realtime => 2,
        }
    }

    pub fn get(&self, transport: Transport) -> Arc<ShortcutTable> {
        Arc::clone(&self.tables[Self::index(transport)].read())
    }

    pub fn set(&self, transport: Transport, table: ShortcutTable) {
        *self.tables[Self::index(transport)].write() = Arc::new(table);
    }

    /// Re-read every table from its source file. Tables without a source are
    /// left alone. Nothing is swapped unless every file loads.
    pub fn reload(&self) -> Result<usize, ShortcutError> {
        let mut fresh = Vec::new();
        for transport in Transport::ALL {
            let current = self.get(transport);
            if current.source().is_some() {
                fresh.push((transport, current.reload()?));
            }
        }
        let reloaded = fresh.len();
        for (transport, table) in fresh {
            self.set(transport, table);
        }
        Ok(reloaded)
    }
}

fn configured_path(config: &Config, transport: Transport) -> Option<&Path> {
    match transport {
        Transport::Console => config.console.shortcuts.as_deref(),
        Transport::Web => config.web.as_ref().and_then(|w| w.shortcuts.as_deref()),
        Transport::Realtime => config.realtime.as_ref().and_then(|r| r.shortcuts.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_reload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ping:\n  _m: system\n  _c: Info\n  _f: ping").unwrap();
        let toml = format!(
            "[server]\nname = \"hive\"\n[console]\nshortcuts = \"{}\"\n",
            file.path().display()
        );
        let config: Config = toml::from_str(&toml).unwrap();

        let set = ShortcutSet::load(&config).unwrap();
        assert_eq!(set.get(Transport::Console).len(), 1);
        assert!(set.get(Transport::Web).is_empty());

        writeln!(file, "up:\n  _m: system\n  _c: Info\n  _f: uptime").unwrap();
        assert_eq!(set.reload().unwrap(), 1);
        assert_eq!(set.get(Transport::Console).len(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ping:\n  _m: system\n  _c: Info\n  _f: ping").unwrap();
        let set = ShortcutSet::empty();
        set.set(Transport::Realtime, ShortcutTable::load(file.path()).unwrap());

        writeln!(file, "  - : [broken").unwrap();
        assert!(set.reload().is_err());
        assert_eq!(set.get(Transport::Realtime).len(), 1);
    }
}
