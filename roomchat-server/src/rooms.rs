//! Room registry for the chat server.
//!
//! Tracks every room the server knows about and which participants are in
//! it. Rooms are created explicitly through the directory endpoint or
//! implicitly by the first `join`. Each participant is one WebSocket
//! connection, identified by a [`ParticipantId`], and may be in any number
//! of rooms at once.
//!
//! Rooms outlive their members: an empty room stays listed until restart.
//! All state is ephemeral.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use roomchat_proto::envelope::{ValidationError, validate_room_name};

/// Identifier assigned to each WebSocket connection.
pub type ParticipantId = Uuid;

/// Outbound queue of a participant's writer task.
pub type Outbox = mpsc::Sender<String>;

/// Frames a participant's outbox holds before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

/// Errors that can occur during room registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The room name is blank.
    #[error("invalid room name: {0}")]
    InvalidName(#[from] ValidationError),
    /// A room with exactly this name already exists.
    #[error("room {0} already exists")]
    AlreadyExists(String),
}

/// In-memory registry of rooms and their members.
///
/// Room names are case-sensitive and stored sorted.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<String, HashMap<ParticipantId, Outbox>>>,
}

impl RoomRegistry {
    /// Creates a new, empty room registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty room.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a blank name, or
    /// [`RegistryError::AlreadyExists`] if the room is already known.
    pub fn create(&self, name: &str) -> Result<(), RegistryError> {
        let name = validate_room_name(name)?;
        let mut rooms = self.rooms.write();
        if rooms.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        rooms.insert(name.to_string(), HashMap::new());
        drop(rooms);
        tracing::info!(room = %name, "room created");
        Ok(())
    }

    /// Adds `participant` to `room`, creating the room if needed.
    ///
    /// Joining a room twice keeps a single membership with the latest outbox.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a blank name.
    pub fn join(
        &self,
        room: &str,
        participant: ParticipantId,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        let room = validate_room_name(room)?;
        let mut rooms = self.rooms.write();
        let members = rooms.entry(room.to_string()).or_default();
        members.insert(participant, outbox);
        let count = members.len();
        drop(rooms);
        tracing::info!(room = %room, %participant, members = count, "participant joined");
        Ok(())
    }

    /// Removes `participant` from `room`. Returns whether it was a member.
    pub fn leave(&self, room: &str, participant: ParticipantId) -> bool {
        let removed = self
            .rooms
            .write()
            .get_mut(room)
            .is_some_and(|members| members.remove(&participant).is_some());
        if removed {
            tracing::info!(room = %room, %participant, "participant left");
        }
        removed
    }

    /// Removes `participant` from every room. Returns the rooms it left.
    pub fn leave_all(&self, participant: ParticipantId) -> Vec<String> {
        let mut left = Vec::new();
        for (room, members) in self.rooms.write().iter_mut() {
            if members.remove(&participant).is_some() {
                left.push(room.clone());
            }
        }
        left
    }

    /// Whether `participant` is currently in `room`.
    #[must_use]
    pub fn is_member(&self, room: &str, participant: ParticipantId) -> bool {
        self.rooms
            .read()
            .get(room)
            .is_some_and(|members| members.contains_key(&participant))
    }

    /// Queues `text` for every member of `room`, the sender included.
    ///
    /// Members whose outbox is closed or full are dropped from the room, so a
    /// stalled reader never holds up the others. Returns the number of
    /// members the text was queued for.
    pub fn broadcast(&self, room: &str, text: &str) -> usize {
        let mut rooms = self.rooms.write();
        let Some(members) = rooms.get_mut(room) else {
            return 0;
        };
        members.retain(|participant, outbox| match outbox.try_send(text.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(room = %room, %participant, "outbox full, dropping participant");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(room = %room, %participant, "dropping closed outbox");
                false
            }
        });
        members.len()
    }

    /// Names of all known rooms, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.rooms.read().keys().cloned().collect()
    }

    /// Number of participants in `room`, or `None` if it does not exist.
    #[must_use]
    pub fn member_count(&self, room: &str) -> Option<usize> {
        self.rooms.read().get(room).map(HashMap::len)
    }
}
