//! Network module.
//!
//! Contains the realtime Gateway (websocket listener), the per-client
//! Connection loop and the bus relay that pushes events to clients.

mod connection;
mod gateway;
mod relay;

pub use connection::Connection;
pub use gateway::Gateway;
pub use relay::{CHANNEL_KEY, RealtimeRelay};
