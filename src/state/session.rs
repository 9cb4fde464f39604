//! Per-connection identity and authorization state.
//!
//! ```text
//! ┌─────────────┐   login()    ┌───────────────┐
//! │  Anonymous  │ ───────────▶ │ Authenticated │
//! │             │ ◀─────────── │ identity ✓    │
//! └─────────────┘   logout()   └───────────────┘
//!                (publishes an "offline" presence event)
//! ```

use super::{ConnId, Transport};
use crate::bus::MessageBus;
use bee_proto::{Params, PermissionRule, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value as Json, json};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

/// Bus topic for online/offline events.
pub const PRESENCE_TOPIC: &str = "presence";

/// Who a session is authenticated as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub name: Option<String>,
    /// Admitted to every action once free and granted rules are exhausted.
    pub is_admin: bool,
    /// A deactivated identity is denied everything not admitted by a rule.
    pub is_active: bool,
}

impl Identity {
    /// An active, non-admin identity.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            is_admin: false,
            is_active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Presence event payload.
    pub fn event(&self, kind: &str) -> Json {
        json!({
            "event": kind,
            "uid": self.uid,
            "name": self.name,
        })
    }
}

/// One connection's session.
#[derive(Debug)]
pub struct Session {
    conn: ConnId,
    transport: Transport,
    peer: Option<SocketAddr>,
    identity: Option<Identity>,
    permissions: Vec<PermissionRule>,
    params: Params,
    login_time: Option<DateTime<Utc>>,
    client_ip: Option<IpAddr>,
}

impl Session {
    /// A fresh anonymous session.
    pub fn new(conn: ConnId, transport: Transport, peer: Option<SocketAddr>) -> Self {
        Self {
            conn,
            transport,
            peer,
            identity: None,
            permissions: Vec::new(),
            params: Params::new(),
            login_time: None,
            client_ip: None,
        }
    }

    /// A session that belongs to no registered connection (web requests).
    pub fn anonymous(transport: Transport, peer: Option<SocketAddr>) -> Self {
        Self::new(ConnId::new(), transport, peer)
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Rules granted at login.
    pub fn permissions(&self) -> &[PermissionRule] {
        &self.permissions
    }

    pub fn login_time(&self) -> Option<DateTime<Utc>> {
        self.login_time
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// A login parameter, if set.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Authenticate. Replaces any previous identity without an offline event.
    pub fn login(&mut self, identity: Identity, permissions: Vec<PermissionRule>, params: Params) {
        debug!(conn = %self.conn, uid = %identity.uid, "Session login");
        self.identity = Some(identity);
        self.permissions = permissions;
        self.params = params;
        self.login_time = Some(Utc::now());
        self.client_ip = self.peer.map(|p| p.ip());
    }

    /// Return to anonymous. Publishes an offline event when the session was
    /// authenticated.
    pub fn logout(&mut self, bus: &dyn MessageBus) {
        if let Some(identity) = self.identity.take() {
            debug!(conn = %self.conn, uid = %identity.uid, "Session logout");
            if let Err(e) = bus.publish(PRESENCE_TOPIC, identity.event("offline")) {
                warn!(conn = %self.conn, error = %e, "Failed to publish offline event");
            }
        }
        self.permissions.clear();
        self.params.clear();
        self.login_time = None;
        self.client_ip = None;
    }
}
