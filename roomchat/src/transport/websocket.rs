//! WebSocket transport session for `RoomChat`.
//!
//! Implements the [`Transport`] trait over a single WebSocket connection to
//! the chat server. The connection is split into two background tasks:
//! a writer fed by an unbounded queue (so `send` never blocks and keeps call
//! order) and a reader that turns frames into [`TransportEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Transport, TransportError, TransportEvent, TransportType};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for connecting to the chat server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket transport implementing the [`Transport`] trait.
///
/// Created via [`WebSocketTransport::connect`], which returns the transport
/// together with the receiver for its lifecycle events.
pub struct WebSocketTransport {
    /// The server URL (ws:// or wss://).
    url: String,
    /// Queue drained by the writer task.
    outbound: mpsc::UnboundedSender<Message>,
    /// Cleared by either task when the connection ends.
    connected: Arc<AtomicBool>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect to the chat server's WebSocket endpoint.
    ///
    /// On success the returned receiver already holds
    /// [`TransportEvent::Established`]; inbound frames follow as
    /// [`TransportEvent::Message`], and the stream ends with
    /// [`TransportEvent::Closed`].
    ///
    /// # Errors
    ///
    /// - [`TransportError::Timeout`] if the handshake does not finish within `timeout`.
    /// - [`TransportError::Unreachable`] if the server refuses the connection.
    /// - [`TransportError::Io`] for HTTP upgrade or protocol failures.
    pub async fn connect(
        url: &str,
        timeout: Duration,
        event_buffer: usize,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), TransportError> {
        let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "WebSocket connect timed out");
                TransportError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, err = %e, "WebSocket connect failed");
                map_ws_connect_error(url, e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let _ = event_tx.send(TransportEvent::Established).await;
        tracing::info!(url, "WebSocket session established");

        let connected = Arc::new(AtomicBool::new(true));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let writer_handle = tokio::spawn(writer_loop(
            ws_sender,
            outbound_rx,
            event_tx.clone(),
            Arc::clone(&connected),
        ));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, event_tx, Arc::clone(&connected)));

        let transport = Self {
            url: url.to_string(),
            outbound: outbound_tx,
            connected,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        };
        Ok((transport, event_rx))
    }

    /// Return the server URL this transport is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start a graceful close of the session.
    ///
    /// Queues a Close frame behind any pending payloads. The event stream
    /// reports [`TransportEvent::Closed`] once the server acknowledges.
    pub fn close(&self) {
        if self.outbound.send(Message::Close(None)).is_ok() {
            tracing::debug!(url = %self.url, "close frame queued");
        }
        self.connected.store(false, Ordering::Relaxed);
    }
}

impl Transport for WebSocketTransport {
    /// Queue a text frame for the writer task.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the session has ended.
    fn send(&self, payload: String) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(Message::Text(payload.into()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }
}

/// Background task that writes queued frames to the socket.
///
/// Exits when the queue is dropped, after a Close frame, or on the first
/// write failure (which is reported as [`TransportEvent::Error`]).
async fn writer_loop(
    mut ws_sender: WsSender,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = ws_sender.send(msg).await {
            tracing::warn!(err = %e, "WebSocket write failed");
            connected.store(false, Ordering::Relaxed);
            let _ = events.send(TransportEvent::Error(e.to_string())).await;
            return;
        }
        if closing {
            break;
        }
    }
    let _ = ws_sender.close().await;
    tracing::debug!("WebSocket writer task exiting");
}

/// Background task that reads frames and dispatches them as events.
///
/// Text frames are forwarded verbatim; binary frames are forwarded if they
/// are valid UTF-8 and skipped otherwise. Emits [`TransportEvent::Closed`]
/// exactly once, when the stream ends for any reason.
async fn reader_loop(
    mut ws_reader: WsReader,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = ws_reader.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if events
                    .send(TransportEvent::Message(text.to_string()))
                    .await
                    .is_err()
                {
                    // Receiver dropped, nobody is listening.
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => {
                    if events.send(TransportEvent::Message(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "non UTF-8 binary frame, skipping");
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "WebSocket read error");
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    let _ = events.send(TransportEvent::Closed).await;
    tracing::info!("WebSocket reader task exiting");
}

/// Map a tungstenite connect error to a [`TransportError`].
fn map_ws_connect_error(url: &str, err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(url.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => TransportError::Io(std::io::Error::other(format!(
            "WebSocket upgrade rejected: status {}",
            response.status()
        ))),
        other => TransportError::Io(std::io::Error::other(format!(
            "WebSocket connection error: {other}"
        ))),
    }
}
