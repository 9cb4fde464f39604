//! `realtime_message` hook: delivers bus events to websocket clients.
//!
//! Routing keys are consumed in this order: `_uid` (every connection of that
//! user), `_broadcast` (every connection), `_peer` (the connection at that
//! address). Events with none of them are not delivered. The frame sent is
//! the payload without routing keys, plus `_channel`.

use crate::bus::{BROADCAST_KEY, BusHook, PEER_KEY, UID_KEY};
use crate::state::SessionTable;
use async_trait::async_trait;
use serde_json::Value as Json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::trace;

/// Payload key naming the channel a relayed frame came from.
pub const CHANNEL_KEY: &str = "_channel";

pub struct RealtimeRelay {
    sessions: Arc<SessionTable>,
}

impl RealtimeRelay {
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self { sessions }
    }

    /// Deliver one event. Returns the number of frames queued.
    pub fn relay(&self, channel: &str, params: Json) -> usize {
        let Json::Object(mut map) = params else {
            return 0;
        };
        let uid = map.remove(UID_KEY);
        let broadcast = map
            .remove(BROADCAST_KEY)
            .is_some_and(|b| !matches!(b, Json::Null | Json::Bool(false)));
        let peer = map
            .remove(PEER_KEY)
            .and_then(|p| p.as_str().and_then(|p| p.parse::<SocketAddr>().ok()));
        map.insert(CHANNEL_KEY.to_string(), Json::String(channel.to_string()));
        let frame = Json::Object(map).to_string();

        if let Some(uid) = uid.as_ref().and_then(Json::as_str) {
            self.sessions.send_to_uid(uid, &frame)
        } else if broadcast {
            self.sessions.broadcast(&frame)
        } else if let Some(peer) = peer {
            self.sessions
                .find_by_peer(peer)
                .map_or(0, |client| usize::from(client.push(frame)))
        } else {
            trace!(%channel, "Event has no realtime recipient");
            0
        }
    }
}

#[async_trait]
impl BusHook for RealtimeRelay {
    async fn call(&self, channel: &str, params: Json) {
        let delivered = self.relay(channel, params);
        trace!(%channel, delivered, "Relayed bus event");
    }
}
