//! Transport layer abstraction for `RoomChat`.
//!
//! Defines the [`Transport`] trait the synchronization controller sends
//! through, and the [`TransportEvent`] lifecycle stream every session emits.
//! Concrete implementations:
//! - [`websocket::WebSocketTransport`]: the real-time WebSocket session
//! - [`loopback::LoopbackTransport`]: in-process channels for testing
//!
//! A transport never interprets payloads; encoding happens in the codec.

pub mod loopback;
pub mod websocket;

use std::fmt;

/// Lifecycle and data events produced by a transport session.
///
/// Sessions deliver these in order on a single channel, starting with
/// [`TransportEvent::Established`] and ending with [`TransportEvent::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and sends will be accepted.
    Established,
    /// A text payload arrived from the server.
    Message(String),
    /// A connection-level fault was observed.
    Error(String),
    /// The connection is gone. No further events follow.
    Closed,
}

/// Describes which kind of transport is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// WebSocket session to the chat server.
    WebSocket,
    /// In-process loopback for testing.
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "WebSocket"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Connecting did not complete in time.
    #[error("transport operation timed out")]
    Timeout,

    /// The server could not be reached at the given address.
    #[error("server {0} is unreachable")]
    Unreachable(String),

    /// An underlying I/O or protocol error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered, fire-and-forget outbound side of a transport session.
///
/// `send` only hands the payload to the session's writer queue; it never
/// waits for the server. Payloads queued by successive calls reach the
/// wire in call order.
pub trait Transport: Send {
    /// Queue a text payload for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the session is gone.
    fn send(&self, payload: String) -> Result<(), TransportError>;

    /// Whether the session still accepts sends.
    fn is_connected(&self) -> bool;

    /// Return the type of this transport.
    fn transport_type(&self) -> TransportType;
}
