//! Chat synchronization layer for `RoomChat`.
//!
//! Contains the [`SyncController`], which owns the transport session, the
//! membership state machine and the per-room history, and reacts to the
//! three kinds of input the client ever sees:
//!
//! 1. connection lifecycle events from the transport,
//! 2. inbound envelopes,
//! 3. user intents (send, switch, leave, create room).
//!
//! Each reaction runs to completion before the next one starts; the
//! controller is driven from a single task and needs no locking.
//!
//! Sent chat messages are not echoed locally. They appear, like everyone
//! else's, when the server broadcasts them back.

pub mod history;
pub mod membership;

use tokio::sync::mpsc;

use roomchat_proto::codec::{self, CodecError};
use roomchat_proto::envelope::{
    ChatMessage, Envelope, PLACEHOLDER_SENDER, ValidationError, validate_room_name,
};

use crate::directory::{DirectoryError, RoomDirectory};
use crate::transport::{Transport, TransportError, TransportEvent};

use history::RoomHistory;
use membership::{Membership, RoomMembership, Transition};

/// Errors returned when a user intent is rejected.
///
/// None of these are fatal to the session, and none of them change
/// membership state.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The room name or message content is blank.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A chat message was sent while not in any room.
    #[error("no active room")]
    NoActiveRoom,

    /// The connection is not (or no longer) established.
    #[error("not connected")]
    NotConnected,

    /// An outbound envelope could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The transport refused the payload.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The room directory request failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Instructions for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Append a message to the visible room.
    MessageAppended(ChatMessage),
    /// Replace the message view with `messages` for `room`.
    RoomRepainted {
        /// Room now shown.
        room: String,
        /// Buffered history, in arrival order.
        messages: Vec<ChatMessage>,
    },
    /// The client left `room` and now shows no room.
    RoomLeft {
        /// Room that was left.
        room: String,
    },
    /// Seed the room list.
    RoomListLoaded(Vec<String>),
    /// Add a newly created room to the room list.
    RoomAdded(String),
    /// The connection opened or closed.
    ConnectionChanged {
        /// Whether sends are currently possible.
        connected: bool,
    },
    /// A non-fatal problem worth showing to the user.
    Notice(String),
}

/// Composes the transport, directory, membership and history.
pub struct SyncController<T: Transport, D: RoomDirectory> {
    transport: T,
    directory: D,
    membership: RoomMembership,
    history: RoomHistory,
    /// Set by `on_connection_established`, cleared on close.
    connected: bool,
    view_tx: mpsc::UnboundedSender<ViewEvent>,
}

impl<T: Transport, D: RoomDirectory> SyncController<T, D> {
    /// Creates a controller with unbounded history.
    ///
    /// Returns the controller and the receiver the view layer should drain.
    pub fn new(transport: T, directory: D) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        Self::with_history_limit(transport, directory, None)
    }

    /// Creates a controller that keeps at most `max_per_room` messages per room.
    pub fn with_history_limit(
        transport: T,
        directory: D,
        max_per_room: Option<usize>,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (view_tx, view_rx) = mpsc::unbounded_channel();
        let controller = Self {
            transport,
            directory,
            membership: RoomMembership::new(),
            history: RoomHistory::with_capacity_limit(max_per_room),
            connected: false,
            view_tx,
        };
        (controller, view_rx)
    }

    /// Current membership state.
    pub const fn membership(&self) -> &Membership {
        self.membership.state()
    }

    /// Name of the active room, if any.
    pub fn active_room(&self) -> Option<&str> {
        self.membership.active_room()
    }

    /// Read access to the buffered history.
    pub const fn history(&self) -> &RoomHistory {
        &self.history
    }

    /// Whether the session has been established and not yet closed.
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatches a transport event to the matching reaction.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Established => self.on_connection_established(),
            TransportEvent::Message(text) => self.on_envelope_received(&text),
            TransportEvent::Error(reason) => self.on_transport_error(&reason),
            TransportEvent::Closed => self.on_connection_closed(),
        }
    }

    /// The connection is open; sends are enabled. Membership is untouched.
    pub fn on_connection_established(&mut self) {
        self.connected = true;
        tracing::info!(transport = %self.transport.transport_type(), "connection established");
        self.emit(ViewEvent::ConnectionChanged { connected: true });
    }

    /// A connection-level fault was reported. Logged only; no recovery.
    pub fn on_transport_error(&mut self, reason: &str) {
        tracing::warn!(
            error = reason,
            membership = %self.membership.state(),
            "transport error"
        );
        self.emit(ViewEvent::Notice(format!("Connection error: {reason}")));
    }

    /// The connection is gone. Sends are disabled for the rest of the
    /// session; membership stays at its last known value.
    pub fn on_connection_closed(&mut self) {
        self.connected = false;
        tracing::info!(membership = %self.membership.state(), "connection closed");
        self.emit(ViewEvent::ConnectionChanged { connected: false });
    }

    /// Handles one inbound text frame.
    ///
    /// Chat messages are recorded for their room and shown if that room is
    /// active. Join/leave frames are informational and never change
    /// membership. Frames that fail to decode are logged and dropped.
    pub fn on_envelope_received(&mut self, wire: &str) {
        let envelope = match codec::decode(wire) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable envelope");
                return;
            }
        };

        match envelope {
            Envelope::Chat(message) => {
                let room = message.room.clone();
                let visible = self.membership.is_active(&room);
                tracing::debug!(room = %room, sender = %message.sender, visible, "chat received");
                self.history.record(&room, message.clone());
                if visible {
                    self.emit(ViewEvent::MessageAppended(message));
                }
            }
            Envelope::Join { room } => {
                tracing::info!(room = %room, "join event from server");
            }
            Envelope::Leave { room } => {
                tracing::info!(room = %room, "leave event from server");
            }
        }
    }

    /// Sends `content` to the active room.
    ///
    /// The message is not recorded or shown until the server broadcasts it
    /// back.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if the trimmed content is empty.
    /// - [`SyncError::NoActiveRoom`] if no room is active.
    /// - [`SyncError::NotConnected`] if the session is not established.
    /// - [`SyncError::Transport`] if the transport refuses the payload.
    pub fn send_chat(&mut self, content: &str) -> Result<(), SyncError> {
        if content.trim().is_empty() {
            tracing::debug!("ignoring blank chat message");
            return Err(ValidationError::EmptyContent.into());
        }
        let room = self.active_room().ok_or(SyncError::NoActiveRoom)?;
        self.ensure_connected()?;

        let message = ChatMessage::outgoing(room, PLACEHOLDER_SENDER, content)?;
        let payload = codec::encode(&Envelope::Chat(message))?;
        self.transport.send(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "chat send failed");
        })?;
        Ok(())
    }

    /// Makes `name` the active room and repaints the view from history.
    ///
    /// Switching away from another room sends `leave` for it before `join`
    /// for the new one. Switching to the active room sends nothing and works
    /// whether or not the session is connected.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if the trimmed name is empty.
    /// - [`SyncError::NotConnected`] if the room changes while the session
    ///   is not established.
    /// - [`SyncError::Transport`] if an envelope cannot be queued; membership
    ///   keeps its previous value.
    pub fn switch_room(&mut self, name: &str) -> Result<Transition, SyncError> {
        let transition = self.membership.plan_switch(name)?;
        if transition.is_change() {
            self.ensure_connected()?;
            self.send_transition(&transition)?;
            self.membership.apply(&transition);
        }

        if let Transition::Switched { from, to } = &transition {
            tracing::info!(from = %from, to = %to, "switched room");
        } else if let Transition::Joined { room } = &transition {
            tracing::info!(room = %room, "joined room");
        }

        self.emit(ViewEvent::RoomRepainted {
            room: name.to_string(),
            messages: self.history.replay(name),
        });
        Ok(transition)
    }

    /// Leaves the active room without entering another.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotConnected`] if a leave is due but the session is down.
    /// - [`SyncError::Transport`] if the leave cannot be queued.
    pub fn leave_room(&mut self) -> Result<Transition, SyncError> {
        let transition = self.membership.plan_leave();
        if let Transition::Left { room } = &transition {
            self.ensure_connected()?;
            self.send_transition(&transition)?;
            tracing::info!(room = %room, "left room");
            self.emit(ViewEvent::RoomLeft { room: room.clone() });
        }
        self.membership.apply(&transition);
        Ok(transition)
    }

    /// Asks the directory to create `name`.
    ///
    /// On success the room is added to the room list; the active room does
    /// not change.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if the trimmed name is empty.
    /// - [`SyncError::Directory`] if the directory refuses or is unreachable.
    pub async fn request_create_room(&self, name: &str) -> Result<(), SyncError> {
        let name = validate_room_name(name)?;
        match self.directory.create_room(name).await {
            Ok(()) => {
                self.emit(ViewEvent::RoomAdded(name.to_string()));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(room = %name, error = %e, "room creation failed");
                Err(e.into())
            }
        }
    }

    /// Fetches the room list and seeds the view with it.
    ///
    /// A failed fetch is logged and degrades to an empty list.
    pub async fn load_rooms(&self) -> Vec<String> {
        let rooms = match self.directory.list_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch room list");
                Vec::new()
            }
        };
        self.emit(ViewEvent::RoomListLoaded(rooms.clone()));
        rooms
    }

    /// Shows a rejected intent to the user.
    pub fn report(&self, error: &SyncError) {
        self.emit(ViewEvent::Notice(error.to_string()));
    }

    fn ensure_connected(&self) -> Result<(), SyncError> {
        if self.connected && self.transport.is_connected() {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    /// Encodes every envelope first, then queues them in order.
    fn send_transition(&self, transition: &Transition) -> Result<(), SyncError> {
        let payloads = transition
            .envelopes()
            .iter()
            .map(codec::encode)
            .collect::<Result<Vec<_>, _>>()?;
        for payload in payloads {
            self.transport.send(payload).inspect_err(|e| {
                tracing::warn!(
                    error = %e,
                    membership = %self.membership.state(),
                    "membership envelope not sent, keeping last known room"
                );
            })?;
        }
        Ok(())
    }

    fn emit(&self, event: ViewEvent) {
        // The view may have gone away during shutdown.
        let _ = self.view_tx.send(event);
    }
}
