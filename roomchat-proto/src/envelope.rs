//! Envelope types exchanged over the `RoomChat` real-time channel.
//!
//! Every frame on the channel is one [`Envelope`], serialized as an
//! internally tagged JSON object:
//!
//! ```text
//! {"type": "chat" | "join" | "leave", "room": "...", "content"?, "sender"?, "timestamp"?}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sender name stamped on every outgoing chat message.
///
/// Sessions carry no identity, so all clients send under the same name.
pub const PLACEHOLDER_SENDER: &str = "User";

/// Errors raised when user-supplied input cannot form a valid envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The room name is empty or whitespace only.
    #[error("room name cannot be empty")]
    EmptyRoom,

    /// The chat content is empty or whitespace only.
    #[error("message content cannot be empty")]
    EmptyContent,
}

/// One discrete protocol message on the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// A chat message addressed to a room.
    Chat(ChatMessage),
    /// The sender entered a room.
    Join {
        /// Room being joined.
        room: String,
    },
    /// The sender left a room.
    Leave {
        /// Room being left.
        room: String,
    },
}

impl Envelope {
    /// Builds a `join` envelope for `room`.
    pub fn join(room: impl Into<String>) -> Self {
        Self::Join { room: room.into() }
    }

    /// Builds a `leave` envelope for `room`.
    pub fn leave(room: impl Into<String>) -> Self {
        Self::Leave { room: room.into() }
    }

    /// The room this envelope is addressed to.
    #[must_use]
    pub fn room(&self) -> &str {
        match self {
            Self::Chat(msg) => &msg.room,
            Self::Join { room } | Self::Leave { room } => room,
        }
    }

    /// The wire tag of this envelope (`chat`, `join` or `leave`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
        }
    }
}

/// A chat message as carried inside [`Envelope::Chat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message belongs to.
    pub room: String,
    /// Display name of the author.
    #[serde(default)]
    pub sender: String,
    /// Message body. May be empty on receipt.
    pub content: String,
    /// Client-assigned send time. Values that are not RFC 3339 strings
    /// decode as `None` rather than rejecting the message.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(text) => match text.parse::<DateTime<Utc>>() {
            Ok(ts) => Ok(Some(ts)),
            Err(e) => {
                tracing::debug!(timestamp = %text, error = %e, "ignoring unparsable timestamp");
                Ok(None)
            }
        },
        other => {
            tracing::debug!(timestamp = %other, "ignoring non-string timestamp");
            Ok(None)
        }
    }
}

impl ChatMessage {
    /// Creates an outgoing message stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `room` or the trimmed `content` is empty.
    pub fn outgoing(
        room: &str,
        sender: &str,
        content: &str,
    ) -> Result<Self, ValidationError> {
        let room = validate_room_name(room)?;
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(Self {
            room: room.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp: Some(Utc::now()),
        })
    }
}

/// Checks that a room name is usable, returning it unchanged.
///
/// Room names are case-sensitive identifiers; surrounding whitespace is
/// only inspected, never stripped, so `"lobby"` and `" lobby"` stay distinct.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyRoom`] if the trimmed name is empty.
pub fn validate_room_name(name: &str) -> Result<&str, ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyRoom)
    } else {
        Ok(name)
    }
}
