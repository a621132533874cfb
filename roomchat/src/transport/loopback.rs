//! Loopback transport for testing.
//!
//! Uses in-process [`tokio::sync::mpsc`] channels in place of a server.
//! [`LoopbackTransport::create`] returns the client-side transport, its
//! event receiver, and a [`LoopbackPeer`] that plays the server: it sees
//! every payload the client sends and injects lifecycle events and
//! inbound frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use roomchat_proto::codec;
use roomchat_proto::envelope::Envelope;

use super::{Transport, TransportError, TransportEvent, TransportType};

/// In-process transport backed by `tokio::sync::mpsc` channels.
pub struct LoopbackTransport {
    /// Payloads sent by the client, read by the peer.
    outbound: mpsc::UnboundedSender<String>,
    /// Shared with the peer so it can sever the session.
    connected: Arc<AtomicBool>,
}

/// Server side of a loopback session.
pub struct LoopbackPeer {
    /// Receives everything the client sent, in order.
    sent: mpsc::UnboundedReceiver<String>,
    /// Feeds events into the client's event receiver.
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Create a connected loopback session.
    ///
    /// The `buffer` parameter controls the capacity of the event channel.
    /// No [`TransportEvent::Established`] is queued until the peer calls
    /// [`LoopbackPeer::establish`].
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use roomchat::transport::loopback::LoopbackTransport;
    /// use roomchat::transport::Transport;
    ///
    /// # async fn example() {
    /// let (client, mut events, mut peer) = LoopbackTransport::create(32);
    /// peer.establish().await;
    /// client.send(r#"{"type":"join","room":"general"}"#.to_string()).unwrap();
    /// assert_eq!(peer.sent_envelopes().len(), 1);
    /// # let _ = events.recv().await;
    /// # }
    /// ```
    #[must_use]
    pub fn create(buffer: usize) -> (Self, mpsc::Receiver<TransportEvent>, LoopbackPeer) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let connected = Arc::new(AtomicBool::new(true));

        let transport = Self {
            outbound: sent_tx,
            connected: Arc::clone(&connected),
        };
        let peer = LoopbackPeer {
            sent: sent_rx,
            events: event_tx,
            connected,
        };
        (transport, event_rx, peer)
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, payload: String) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(payload)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.outbound.is_closed()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}

impl LoopbackPeer {
    /// Report the connection as open.
    pub async fn establish(&self) {
        let _ = self.events.send(TransportEvent::Established).await;
    }

    /// Deliver a raw text frame to the client.
    pub async fn deliver(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(text.into())).await;
    }

    /// Encode and deliver an envelope to the client.
    pub async fn deliver_envelope(&self, envelope: &Envelope) {
        match codec::encode(envelope) {
            Ok(text) => self.deliver(text).await,
            Err(e) => tracing::warn!(error = %e, "loopback peer could not encode envelope"),
        }
    }

    /// Report a connection fault without closing.
    pub async fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Error(reason.into())).await;
    }

    /// Close the session. Subsequent client sends fail.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let _ = self.events.send(TransportEvent::Closed).await;
    }

    /// Drain every payload the client has sent so far.
    pub fn sent_payloads(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        while let Ok(payload) = self.sent.try_recv() {
            payloads.push(payload);
        }
        payloads
    }

    /// Drain and decode every payload the client has sent so far.
    ///
    /// Payloads that do not decode are skipped.
    pub fn sent_envelopes(&mut self) -> Vec<Envelope> {
        self.sent_payloads()
            .iter()
            .filter_map(|p| codec::decode(p).ok())
            .collect()
    }
}
