//! Message bus.
//!
//! Outbound results, errors and presence events are published on named
//! channels `{prefix}-{topic}`. The daemon also pattern-subscribes to
//! `{prefix}-*` and routes what it receives to per-transport hooks (see
//! [`listener`]).

pub mod listener;

pub use listener::{BusHook, HookTable, run_listener};

use crate::config::BusConfig;
use serde_json::Value as Json;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

/// Payload key naming the connection an event is addressed to.
pub const PEER_KEY: &str = "_peer";
/// Payload key naming the user an event is addressed to.
pub const UID_KEY: &str = "_uid";
/// Payload key requesting delivery to every connection.
pub const BROADCAST_KEY: &str = "_broadcast";

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid bus configuration: {0}")]
    Config(String),
    #[error("bus payload must be a JSON object")]
    NotAnObject,
}

/// One published message.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    /// Full channel name, prefix included.
    pub channel: String,
    pub payload: Json,
}

/// Publish/subscribe collaborator.
pub trait MessageBus: Send + Sync {
    /// Channel prefix.
    fn prefix(&self) -> &str;

    /// Publish `payload` on `{prefix}-{topic}`. Returns the number of
    /// subscribers that saw it.
    fn publish(&self, topic: &str, payload: Json) -> Result<usize, BusError>;

    /// Subscribe to every channel under the prefix.
    fn psubscribe(&self) -> broadcast::Receiver<BusEvent>;

    /// Publish, addressing the event to the connection at `peer` when given.
    fn publish_for(
        &self,
        topic: &str,
        mut payload: Json,
        peer: Option<SocketAddr>,
    ) -> Result<usize, BusError> {
        if let Some(peer) = peer {
            let map = payload.as_object_mut().ok_or(BusError::NotAnObject)?;
            map.insert(PEER_KEY.to_string(), Json::String(peer.to_string()));
        }
        self.publish(topic, payload)
    }
}

/// In-process bus on a tokio broadcast channel.
pub struct LocalBus {
    prefix: String,
    tx: broadcast::Sender<BusEvent>,
}

impl LocalBus {
    /// Create the bus described by `config`.
    pub fn bind(config: &BusConfig) -> Result<Self, BusError> {
        if config.prefix.is_empty() {
            return Err(BusError::Config("empty prefix".into()));
        }
        if config.capacity == 0 {
            return Err(BusError::Config("zero capacity".into()));
        }
        let (tx, _) = broadcast::channel(config.capacity);
        Ok(Self {
            prefix: config.prefix.clone(),
            tx,
        })
    }
}

impl MessageBus for LocalBus {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn publish(&self, topic: &str, payload: Json) -> Result<usize, BusError> {
        let channel = format!("{}-{}", self.prefix, topic);
        trace!(%channel, "bus publish");
        crate::metrics::record_bus_event(topic);
        // No subscribers is not an error: the event is simply unobserved.
        Ok(self.tx.send(BusEvent { channel, payload }).unwrap_or(0))
    }

    fn psubscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}
