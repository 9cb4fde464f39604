//! Pattern listener.
//!
//! Receives everything published under the bus prefix, strips the prefix to
//! get the logical channel name and hands `(channel, params)` to the hook
//! registered as `"{transport}_message"` for each running transport.

use super::MessageBus;
use crate::state::Transport;
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback for bus messages.
#[async_trait]
pub trait BusHook: Send + Sync {
    /// `channel` is the logical name (prefix removed).
    async fn call(&self, channel: &str, params: Json);
}

/// Hooks by name.
#[derive(Default)]
pub struct HookTable {
    hooks: HashMap<String, Arc<dyn BusHook>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook name for a transport.
    pub fn hook_name(transport: Transport) -> String {
        format!("{}_message", transport.as_str())
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn BusHook>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BusHook>> {
        self.hooks.get(name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }
}

/// Run until `shutdown` fires or the bus closes.
pub async fn run_listener(
    bus: Arc<dyn MessageBus>,
    hooks: Arc<HookTable>,
    transports: Vec<Transport>,
    shutdown: CancellationToken,
) {
    let mut rx = bus.psubscribe();
    let pattern = format!("{}-", bus.prefix());
    let names: Vec<String> = transports.into_iter().map(HookTable::hook_name).collect();
    info!(pattern = %format!("{pattern}*"), hooks = hooks.len(), "Bus listener started");

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = rx.recv() => received,
        };
        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Bus listener lagged, events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(channel) = event.channel.strip_prefix(&pattern) else {
            continue;
        };
        for name in &names {
            if let Some(hook) = hooks.get(name) {
                debug!(hook = %name, %channel, "Bus hook");
                hook.call(channel, event.payload.clone()).await;
            }
        }
    }
    info!("Bus listener stopped");
}
