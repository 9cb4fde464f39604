//! Module registry with hot reload.
//!
//! Modules are keyed by `(namespace, path)`. Each slot keeps the factory that
//! builds the module and the handle produced by its last successful build.
//! `load` builds on first use and returns the cached handle afterwards;
//! `reload` rebuilds and swaps the handle. Calls already holding the old
//! handle finish on it.

use super::HandlerModule;
use crate::error::HandlerError;
use crate::state::Transport;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Builds a module. Run on first load and on every reload.
pub type ModuleFactory = Arc<dyn Fn() -> Result<HandlerModule, HandlerError> + Send + Sync>;

/// Why a module could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no module {path} in the {namespace} namespace")]
    NotRegistered { namespace: Transport, path: String },
    #[error("module {path} failed to initialize: {source}")]
    Init {
        path: String,
        #[source]
        source: HandlerError,
    },
}

/// One discoverable function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capability {
    pub module: String,
    pub class: String,
    pub function: String,
    pub doc: Option<String>,
}

impl Capability {
    pub fn target(&self) -> String {
        format!("{}.{}.{}", self.module, self.class, self.function)
    }
}

struct Slot {
    factory: ModuleFactory,
    handle: RwLock<Option<Arc<HandlerModule>>>,
    /// Serializes reloads of this path.
    reload_lock: tokio::sync::Mutex<()>,
}

impl Slot {
    fn build(&self, path: &str) -> Result<Arc<HandlerModule>, ResolveError> {
        (self.factory)()
            .map(Arc::new)
            .map_err(|source| ResolveError::Init {
                path: path.to_string(),
                source,
            })
    }
}

/// Handler modules for every namespace.
pub struct ModuleRegistry {
    slots: DashMap<(Transport, String), Arc<Slot>>,
    debug: AtomicBool,
}

impl ModuleRegistry {
    pub fn new(debug: bool) -> Self {
        Self {
            slots: DashMap::new(),
            debug: AtomicBool::new(debug),
        }
    }

    /// Register (or replace) the factory for `path` in `namespace`.
    /// Replacing drops the cached handle.
    pub fn register<F>(&self, namespace: Transport, path: &str, factory: F)
    where
        F: Fn() -> Result<HandlerModule, HandlerError> + Send + Sync + 'static,
    {
        let slot = Arc::new(Slot {
            factory: Arc::new(factory),
            handle: RwLock::new(None),
            reload_lock: tokio::sync::Mutex::new(()),
        });
        self.slots.insert((namespace, path.to_string()), slot);
        debug!(%namespace, path, "Module registered");
    }

    /// Register the same factory in every namespace.
    pub fn register_everywhere<F>(&self, path: &str, factory: F)
    where
        F: Fn() -> Result<HandlerModule, HandlerError> + Send + Sync + 'static,
    {
        let factory: ModuleFactory = Arc::new(factory);
        for namespace in Transport::ALL {
            let factory = Arc::clone(&factory);
            self.register(namespace, path, move || factory());
        }
    }

    pub fn contains(&self, namespace: Transport, path: &str) -> bool {
        self.slots.contains_key(&(namespace, path.to_string()))
    }

    fn slot(&self, namespace: Transport, path: &str) -> Result<Arc<Slot>, ResolveError> {
        self.slots
            .get(&(namespace, path.to_string()))
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| ResolveError::NotRegistered {
                namespace,
                path: path.to_string(),
            })
    }

    /// Resolve a module, building it on first use.
    pub fn load(&self, namespace: Transport, path: &str) -> Result<Arc<HandlerModule>, ResolveError> {
        let result = self.slot(namespace, path).and_then(|slot| {
            if let Some(handle) = slot.handle.read().as_ref() {
                return Ok(Arc::clone(handle));
            }
            let mut handle = slot.handle.write();
            if let Some(existing) = handle.as_ref() {
                return Ok(Arc::clone(existing));
            }
            let built = slot.build(path)?;
            *handle = Some(Arc::clone(&built));
            Ok(built)
        });
        self.log_resolution(namespace, path, &result);
        result
    }

    /// Rebuild a module and swap its handle.
    pub async fn reload(
        &self,
        namespace: Transport,
        path: &str,
    ) -> Result<Arc<HandlerModule>, ResolveError> {
        let slot = self.slot(namespace, path)?;
        let _guard = slot.reload_lock.lock().await;
        let result = slot.build(path);
        match &result {
            Ok(built) => {
                *slot.handle.write() = Some(Arc::clone(built));
                info!(%namespace, path, "Module reloaded");
            }
            Err(e) => warn!(%namespace, path, error = %e, "Module reload failed"),
        }
        crate::metrics::record_reload(namespace.as_str(), result.is_ok());
        result
    }

    /// Every public function of every loadable module in `namespace`,
    /// ordered by module path.
    pub fn discover(&self, namespace: Transport) -> Vec<Capability> {
        let mut paths: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .filter(|path| !path.split('.').any(|seg| seg.starts_with('_')))
            .collect();
        paths.sort();

        let mut found = Vec::new();
        for path in paths {
            let module = match self.load(namespace, &path) {
                Ok(module) => module,
                Err(e) => {
                    warn!(%namespace, path, error = %e, "Skipping module in discovery");
                    continue;
                }
            };
            for class in module.classes().filter(|c| !c.name.starts_with('_')) {
                for function in class.public_functions() {
                    found.push(Capability {
                        module: path.clone(),
                        class: class.name.clone(),
                        function: function.name.clone(),
                        doc: function.doc.clone(),
                    });
                }
            }
        }
        found
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }

    /// Flip the debug flag, returning the new value.
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::Relaxed)
    }

    fn log_resolution(
        &self,
        namespace: Transport,
        path: &str,
        result: &Result<Arc<HandlerModule>, ResolveError>,
    ) {
        let error = result.as_ref().err().map(ToString::to_string);
        let error = error.as_deref();
        if self.is_debug() {
            info!(%namespace, path, ok = result.is_ok(), error, "Module resolution");
        } else {
            debug!(%namespace, path, ok = result.is_ok(), error, "Module resolution");
        }
    }
}
