//! Live connection registry.
//!
//! # Thread Safety
//!
//! All operations go through a DashMap. Lock order is DashMap shard lock,
//! then the client's session lock; no method holds a session lock across an
//! await.

use super::{ConnId, Session, Transport};
use crate::bus::MessageBus;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One registered connection.
#[derive(Clone)]
pub struct Client {
    pub conn: ConnId,
    pub transport: Transport,
    pub peer: Option<SocketAddr>,
    pub session: Arc<RwLock<Session>>,
    /// Push channel to the connection writer, when the transport has one.
    outbound: Option<mpsc::Sender<String>>,
    /// Cancelled to disconnect the client.
    kill: CancellationToken,
}

impl Client {
    /// Queue a frame for the connection. Returns false if the connection has
    /// no push channel, is gone, or its queue is full.
    pub fn push(&self, frame: String) -> bool {
        let Some(tx) = &self.outbound else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn = %self.conn, "Outbound queue full, frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Resolves once the client has been killed.
    pub fn killed(&self) -> CancellationToken {
        self.kill.clone()
    }

    pub fn uid(&self) -> Option<String> {
        self.session.read().uid().map(str::to_owned)
    }
}

/// All live clients.
pub struct SessionTable {
    clients: DashMap<ConnId, Client>,
    bus: Arc<dyn MessageBus>,
}

impl SessionTable {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            clients: DashMap::new(),
            bus,
        }
    }

    /// Register a new anonymous client.
    pub fn add_client(
        &self,
        transport: Transport,
        peer: Option<SocketAddr>,
        outbound: Option<mpsc::Sender<String>>,
    ) -> Client {
        let conn = ConnId::new();
        let client = Client {
            conn,
            transport,
            peer,
            session: Arc::new(RwLock::new(Session::new(conn, transport, peer))),
            outbound,
            kill: CancellationToken::new(),
        };
        self.clients.insert(conn, client.clone());
        debug!(%conn, %transport, ?peer, total = self.clients.len(), "Client added");
        client
    }

    /// Log the client out, then forget it.
    pub fn remove_client(&self, conn: ConnId) -> Option<Client> {
        // The client stays addressable until its offline event is out.
        self.get(conn)?.session.write().logout(self.bus.as_ref());
        let (_, client) = self.clients.remove(&conn)?;
        debug!(%conn, total = self.clients.len(), "Client removed");
        Some(client)
    }

    pub fn get(&self, conn: ConnId) -> Option<Client> {
        self.clients.get(&conn).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of live connections authenticated as `uid`.
    pub fn is_online(&self, uid: &str) -> usize {
        self.clients
            .iter()
            .filter(|c| c.session.read().uid() == Some(uid))
            .count()
    }

    /// Disconnect every connection authenticated as one of `uids`.
    /// Returns how many connections were killed.
    pub fn kill_users(&self, uids: &[&str]) -> usize {
        let victims: Vec<ConnId> = self
            .clients
            .iter()
            .filter(|c| c.session.read().uid().is_some_and(|uid| uids.contains(&uid)))
            .map(|c| c.conn)
            .collect();
        for conn in &victims {
            if let Some(client) = self.remove_client(*conn) {
                client.kill.cancel();
            }
        }
        if !victims.is_empty() {
            info!(killed = victims.len(), "Killed user connections");
        }
        victims.len()
    }

    /// Log out and disconnect every client. Used at shutdown.
    pub fn kill_all(&self) -> usize {
        let conns: Vec<ConnId> = self.clients.iter().map(|c| c.conn).collect();
        let mut killed = 0;
        for conn in conns {
            if let Some(client) = self.remove_client(conn) {
                client.kill.cancel();
                killed += 1;
            }
        }
        if killed > 0 {
            info!(killed, "Disconnected all clients");
        }
        killed
    }

    /// Push to every connection of `uid`. Returns frames delivered.
    pub fn send_to_uid(&self, uid: &str, frame: &str) -> usize {
        self.clients
            .iter()
            .filter(|c| c.session.read().uid() == Some(uid))
            .filter(|c| c.push(frame.to_string()))
            .count()
    }

    /// Push to every connection that has a push channel.
    pub fn broadcast(&self, frame: &str) -> usize {
        self.clients
            .iter()
            .filter(|c| c.push(frame.to_string()))
            .count()
    }

    pub fn find_by_peer(&self, peer: SocketAddr) -> Option<Client> {
        self.clients
            .iter()
            .find(|c| c.peer == Some(peer))
            .map(|c| c.value().clone())
    }
}
