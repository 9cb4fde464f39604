//! Connection and session state.
//!
//! - [`session`]: per-connection identity, granted rules and login parameters
//! - [`table`]: the registry of live connections, keyed by [`ConnId`]
//! - [`hive`]: the shared state every handler can reach

mod hive;
mod session;
mod table;

pub use hive::Hive;
pub use session::{Identity, PRESENCE_TOPIC, Session};
pub use table::{Client, SessionTable};

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// The transport a command arrived on.
///
/// Also names the handler namespace: each transport resolves modules in its
/// own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Console,
    Web,
    Realtime,
}

impl Transport {
    pub const ALL: [Transport; 3] = [Transport::Console, Transport::Web, Transport::Realtime];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Web => "web",
            Self::Realtime => "realtime",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell connections apart in logs.
        write!(f, "{}", &self.0.simple().to_string()[..12])
    }
}
