//! Per-call context handed to handler functions.

use crate::bus::UID_KEY;
use crate::error::HandlerError;
use crate::state::{Client, Hive, Session, Transport};
use bee_proto::{Params, Value};
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::sync::Arc;

/// The connection a call was made on.
#[derive(Clone)]
pub struct Caller {
    pub session: Arc<RwLock<Session>>,
    /// Registered connection, if the transport keeps one.
    pub client: Option<Client>,
}

/// One handler call.
pub struct Invocation {
    pub transport: Transport,
    /// `module.Class.function` being invoked.
    pub target: String,
    pub data: Params,
    /// `None` for static calls.
    pub caller: Option<Caller>,
    pub hive: Arc<Hive>,
}

impl Invocation {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.data.get(name).filter(|v| !v.is_null())
    }

    /// A required string parameter.
    pub fn require_str(&self, name: &str) -> Result<&str, HandlerError> {
        match self.param(name) {
            None => Err(HandlerError::MissingParam(name.to_string())),
            Some(value) => value.as_str().ok_or_else(|| HandlerError::InvalidParam {
                name: name.to_string(),
                reason: "expected a string".into(),
            }),
        }
    }

    /// The caller's session, if this is not a static call.
    pub fn session(&self) -> Option<&Arc<RwLock<Session>>> {
        self.caller.as_ref().map(|c| &c.session)
    }

    /// Send `payload` to the connections of the user named by its `_uid`
    /// key, or to the caller's own connection when there is none.
    ///
    /// Returns the number of frames queued.
    pub fn send(&self, mut payload: Json) -> Result<usize, HandlerError> {
        let uid = payload
            .as_object_mut()
            .and_then(|map| map.remove(UID_KEY))
            .and_then(|uid| uid.as_str().map(str::to_owned));
        let frame = serde_json::to_string(&payload)
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        if let Some(uid) = uid {
            return Ok(self.hive.sessions.send_to_uid(&uid, &frame));
        }
        let own = self
            .caller
            .as_ref()
            .and_then(|c| c.client.as_ref())
            .is_some_and(|client| client.push(frame));
        Ok(usize::from(own))
    }

    /// Send `payload` to every connection.
    pub fn bsend(&self, payload: &Json) -> Result<usize, HandlerError> {
        let frame =
            serde_json::to_string(payload).map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(self.hive.sessions.broadcast(&frame))
    }

    /// Publish on the bus, addressed to the caller's connection when known.
    pub fn publish(&self, topic: &str, payload: Json) -> Result<usize, HandlerError> {
        let peer = self
            .caller
            .as_ref()
            .and_then(|c| c.client.as_ref())
            .and_then(|c| c.peer);
        Ok(self.hive.bus.publish_for(topic, payload, peer)?)
    }
}
