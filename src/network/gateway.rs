//! Gateway - websocket listener for the realtime transport.
//!
//! The Gateway binds the realtime address, validates the handshake `Origin`
//! against `allow_origins` and spawns a [`Connection`] task per client.

use crate::config::RealtimeConfig;
use crate::dispatch::Dispatcher;
use crate::network::Connection;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Accepts realtime connections.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<Vec<String>>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl Gateway {
    pub async fn bind(
        config: &RealtimeConfig,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "Realtime listener bound");
        Ok(Self {
            listener,
            allow_origins: Arc::new(config.allow_origins.clone()),
            dispatcher,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            let (stream, addr) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept realtime connection");
                    continue;
                }
            };
            info!(%addr, "Realtime connection attempt");

            let allowed = Arc::clone(&self.allow_origins);
            let dispatcher = Arc::clone(&self.dispatcher);
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                let cors_callback = |req: &Request, response: Response| {
                    let origin = req.headers().get("Origin").and_then(|o| o.to_str().ok());
                    if origin_allowed(&allowed, origin) {
                        return Ok(response);
                    }
                    warn!(%addr, origin = ?origin, "Realtime CORS rejected");
                    Err(forbidden())
                };

                match accept_hdr_async(stream, cors_callback).await {
                    Ok(ws_stream) => {
                        let connection = Connection::new(ws_stream, addr, dispatcher, shutdown);
                        if let Err(e) = connection.run().await {
                            warn!(%addr, error = %e, "Realtime connection error");
                        }
                    }
                    Err(e) => warn!(%addr, error = %e, "Realtime handshake failed"),
                }
            });
        }
        info!("Realtime listener stopped");
    }
}

/// An empty allow list admits every origin, `*` admits any present origin.
fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    origin.is_some_and(|origin| allowed.iter().any(|a| a == origin || a == "*"))
}

fn forbidden() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("CORS origin not allowed".to_string()));
    *response.status_mut() = http::StatusCode::FORBIDDEN;
    response
}
