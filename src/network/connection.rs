//! Connection - one realtime (websocket) client.
//!
//! The connection task owns the socket. Inbound frames are handed to the
//! dispatcher in arrival order; outbound frames arrive on the client's push
//! queue from handlers and the bus relay.
//!
//! ```text
//!   socket ──► dispatch_realtime ──► (inline | background task)
//!     ▲                                        │
//!     └──────────── push queue ◄───────────────┘
//! ```

use crate::dispatch::{Dispatcher, Payload};
use crate::telemetry::spans;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};

/// Frames buffered per client before pushes are dropped.
const OUTBOUND_QUEUE: usize = 256;

/// A live realtime connection.
pub struct Connection {
    stream: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl Connection {
    pub fn new(
        stream: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream,
            addr,
            dispatcher,
            shutdown,
        }
    }

    /// Serve the connection until the peer leaves, the client is killed or
    /// the daemon shuts down. The client is always logged out on return.
    pub async fn run(self) -> anyhow::Result<()> {
        let sessions = Arc::clone(&self.dispatcher.hive().sessions);
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let client = sessions.add_client(
            crate::state::Transport::Realtime,
            Some(self.addr),
            Some(tx),
        );
        crate::metrics::client_connected();
        let span = spans::connection(&client.conn.to_string(), &self.addr.to_string());

        let killed = client.killed();
        let shutdown = self.shutdown.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let (mut sink, mut source) = self.stream.split();

        let result: anyhow::Result<()> = async {
            info!("Realtime client connected");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break Ok(());
                    }
                    _ = killed.cancelled() => {
                        info!("Client killed - disconnecting");
                        let _ = sink.send(Message::Close(None)).await;
                        break Ok(());
                    }
                    Some(frame) = rx.recv() => {
                        sink.send(Message::Text(frame)).await?;
                    }
                    received = source.next() => match received {
                        None | Some(Ok(Message::Close(_))) => break Ok(()),
                        Some(Err(e)) => break Err(e.into()),
                        Some(Ok(Message::Text(text))) => {
                            dispatcher.dispatch_realtime(&client, Payload::Text(text)).await;
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            dispatcher.dispatch_realtime(&client, Payload::Binary(bytes)).await;
                        }
                        Some(Ok(other)) => debug!(kind = ?other, "Control frame ignored"),
                    },
                }
            }
        }
        .instrument(span.clone())
        .await;

        sessions.remove_client(client.conn);
        crate::metrics::client_disconnected();
        span.in_scope(|| info!("Realtime client disconnected"));
        result
    }
}
