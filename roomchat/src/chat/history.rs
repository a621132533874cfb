//! Per-room message history.
//!
//! [`RoomHistory`] buffers every received chat message by room, in arrival
//! order, so re-entering a room can repaint it without asking the server.
//! Arrival order is authoritative; timestamps are never used to reorder.
//!
//! A room's buffer is created lazily by the first message addressed to it,
//! whether or not the client is currently in that room, and lives for the
//! rest of the session. Buffers are unbounded unless a per-room cap is set,
//! in which case the oldest messages are dropped first.

use std::collections::{HashMap, VecDeque};

use roomchat_proto::envelope::ChatMessage;

/// Ordered per-room buffers of received chat messages.
#[derive(Debug, Default)]
pub struct RoomHistory {
    rooms: HashMap<String, VecDeque<ChatMessage>>,
    /// Optional cap on messages kept per room.
    max_per_room: Option<usize>,
}

impl RoomHistory {
    /// Creates an empty, unbounded history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history that keeps at most `max_per_room` messages per room.
    ///
    /// `None` means unbounded. A cap of zero is treated as one.
    #[must_use]
    pub fn with_capacity_limit(max_per_room: Option<usize>) -> Self {
        Self {
            rooms: HashMap::new(),
            max_per_room: max_per_room.map(|n| n.max(1)),
        }
    }

    /// Appends `message` to `room`'s buffer, creating the buffer if needed.
    ///
    /// Messages are never deduplicated: an echo of the client's own send is
    /// recorded like any other message.
    pub fn record(&mut self, room: &str, message: ChatMessage) {
        let buffer = self.rooms.entry(room.to_string()).or_default();
        buffer.push_back(message);
        if let Some(max) = self.max_per_room {
            while buffer.len() > max {
                buffer.pop_front();
                tracing::trace!(room, max, "history cap reached, dropped oldest message");
            }
        }
    }

    /// Returns `room`'s buffered messages in arrival order.
    ///
    /// Returns an empty vec for rooms that never received a message.
    #[must_use]
    pub fn replay(&self, room: &str) -> Vec<ChatMessage> {
        self.rooms
            .get(room)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of messages buffered for `room`.
    #[must_use]
    pub fn len(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, VecDeque::len)
    }

    /// Whether no message has been recorded for any room.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Names of rooms that have a buffer.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }
}
