//! Integration test common infrastructure.
//!
//! Provides utilities for spawning a test daemon and talking to it over the
//! realtime websocket and the web transport.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::{RealtimeClient, http_get};
#[allow(unused_imports)]
pub use server::TestServer;
