//! WebSocket channel transport.
//!
//! For embeddings whose web content reaches the host over a socket rather
//! than a built-in message pipe: the host binds [`WsServer`] on localhost,
//! hands the `ws://` URL to the page, and [`accept`](WsServer::accept)s one
//! connection as a [`WsChannel`].
//!
//! # Connection Flow
//!
//! 1. Host binds to `localhost:0` (random port)
//! 2. Web content opens a WebSocket to [`WsServer::ws_url`]
//! 3. `accept` upgrades the stream and spawns the channel event loop
//! 4. Text frames in both directions carry bridge envelopes

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::channel::{MessageCallback, MessageChannel};
use crate::error::{Error, Result};

use super::Inbox;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for waiting for the web content to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ChannelCommand
// ============================================================================

/// Internal commands for the channel event loop.
enum ChannelCommand {
    /// Send one text frame.
    Send(String),
    /// Close the socket and stop the loop.
    Shutdown,
}

// ============================================================================
// WsServer
// ============================================================================

/// A bound WebSocket server awaiting its single peer.
pub struct WsServer {
    /// TCP listener for the incoming connection.
    listener: TcpListener,
    /// Port the server is bound to.
    port: u16,
}

impl WsServer {
    /// Binds to the specified address and port (0 for random).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "WebSocket channel server bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the URL the web content should connect to.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Accepts the peer connection and spawns the channel event loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Channel`] if no peer connects within 30s or the upgrade
    ///   fails
    pub async fn accept(self) -> Result<WsChannel> {
        let accept_result = timeout(CONNECTION_TIMEOUT, self.listener.accept()).await;

        let (stream, addr) = accept_result
            .map_err(|_| {
                Error::channel(format!(
                    "no peer connected within {}ms",
                    CONNECTION_TIMEOUT.as_millis()
                ))
            })?
            .map_err(Error::Io)?;

        debug!(?addr, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::channel(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port, "WebSocket channel established");

        Ok(WsChannel::new(ws_stream))
    }
}

// ============================================================================
// WsChannel
// ============================================================================

/// WebSocket-backed [`MessageChannel`].
///
/// The spawned event loop owns both halves of the socket: inbound text
/// frames go to the installed callback, outbound payloads drain from one
/// queue, so all sends are serialized onto the loop no matter the calling
/// thread.
#[derive(Clone)]
pub struct WsChannel {
    /// Queue into the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    /// Inbound delivery slot.
    inbox: Arc<Inbox>,
}

impl WsChannel {
    fn new(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(Inbox::default());

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&inbox),
        ));

        Self { command_tx, inbox }
    }

    /// Closes the socket gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ChannelCommand::Shutdown);
    }

    /// Event loop owning the socket.
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        inbox: Arc<Inbox>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound frames from the web content
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            inbox.deliver(text.to_string());
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by peer");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Outbound payloads from either bridge half
                command = command_rx.recv() => {
                    match command {
                        Some(ChannelCommand::Send(payload)) => {
                            if let Err(e) = ws_write.send(Message::Text(payload.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }

                        Some(ChannelCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        debug!("Channel event loop terminated");
    }
}

impl MessageChannel for WsChannel {
    fn send(&self, payload: String) -> Result<()> {
        self.command_tx
            .send(ChannelCommand::Send(payload))
            .map_err(|_| Error::ChannelClosed)
    }

    fn set_on_message(&self, callback: MessageCallback) {
        self.inbox.install(callback);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = WsServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(server.port() > 0);
        assert!(server.ws_url().starts_with("ws://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_text_frames_round_trip() {
        let server = WsServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind");
        let url = server.ws_url();

        let client = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .expect("connect");
            ws.send(Message::Text("from-page".into())).await.expect("send");
            match ws.next().await {
                Some(Ok(Message::Text(text))) => text.to_string(),
                other => panic!("unexpected frame: {other:?}"),
            }
        });

        let channel = server.accept().await.expect("accept");

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.set_on_message(Arc::new(move |payload| sink.lock().push(payload)));

        channel.send("from-host".to_string()).expect("send");

        let echoed = client.await.expect("client task");
        assert_eq!(echoed, "from-host");

        // Inbound frame arrived through the callback.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock(), vec!["from-page".to_string()]);

        channel.shutdown();
    }
}
