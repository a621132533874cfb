//! Room membership state machine.
//!
//! A client is in at most one room per connection. [`RoomMembership`]
//! tracks that room and computes the envelopes a room change requires:
//!
//! | current state       | intent        | envelopes              | next state          |
//! |---------------------|---------------|------------------------|---------------------|
//! | `ActiveRoom(R)`     | switch to `R` | none                   | `ActiveRoom(R)`     |
//! | `ActiveRoom(X)`     | switch to `R` | `leave(X)`, `join(R)`  | `ActiveRoom(R)`     |
//! | `NoActiveRoom`      | switch to `R` | `join(R)`              | `ActiveRoom(R)`     |
//! | `ActiveRoom(X)`     | leave         | `leave(X)`             | `NoActiveRoom`      |
//! | `NoActiveRoom`      | leave         | none                   | `NoActiveRoom`      |
//!
//! The state is a local prediction. It is updated as soon as the envelopes
//! are handed to the transport and is never driven by join/leave frames the
//! server sends back.
//!
//! Planning and applying are separate steps so a caller can send the
//! envelopes first and only commit the new state once they are queued.

use std::fmt;

use roomchat_proto::envelope::{Envelope, ValidationError, validate_room_name};

/// Which room, if any, the client is currently in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Membership {
    /// Not in any room. Initial state of every session.
    #[default]
    NoActiveRoom,
    /// In exactly this room.
    ActiveRoom(String),
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActiveRoom => write!(f, "no active room"),
            Self::ActiveRoom(room) => write!(f, "in {room}"),
        }
    }
}

/// A planned change of membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do; already in the requested state.
    Unchanged,
    /// Enter `room` from `NoActiveRoom`.
    Joined {
        /// Room entered.
        room: String,
    },
    /// Leave `from`, then enter `to`.
    Switched {
        /// Room left.
        from: String,
        /// Room entered.
        to: String,
    },
    /// Leave `room` without entering another.
    Left {
        /// Room left.
        room: String,
    },
}

impl Transition {
    /// Envelopes to send for this transition, in wire order.
    ///
    /// A switch always yields `leave` before `join` so the server never sees
    /// the client in two rooms at once.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope> {
        match self {
            Self::Unchanged => Vec::new(),
            Self::Joined { room } => vec![Envelope::join(room.as_str())],
            Self::Switched { from, to } => {
                vec![Envelope::leave(from.as_str()), Envelope::join(to.as_str())]
            }
            Self::Left { room } => vec![Envelope::leave(room.as_str())],
        }
    }

    /// Whether applying this transition changes the state.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Tracks the client's single active room.
#[derive(Debug, Default)]
pub struct RoomMembership {
    state: Membership,
}

impl RoomMembership {
    /// Creates a state machine in [`Membership::NoActiveRoom`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &Membership {
        &self.state
    }

    /// Name of the active room, if any.
    #[must_use]
    pub fn active_room(&self) -> Option<&str> {
        match &self.state {
            Membership::NoActiveRoom => None,
            Membership::ActiveRoom(room) => Some(room),
        }
    }

    /// Whether `room` is the active room.
    #[must_use]
    pub fn is_active(&self, room: &str) -> bool {
        self.active_room() == Some(room)
    }

    /// Plans a switch to `room` without changing state.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRoom`] if `room` is blank.
    pub fn plan_switch(&self, room: &str) -> Result<Transition, ValidationError> {
        let room = validate_room_name(room)?;
        let transition = match &self.state {
            Membership::ActiveRoom(current) if current == room => Transition::Unchanged,
            Membership::ActiveRoom(current) => Transition::Switched {
                from: current.clone(),
                to: room.to_string(),
            },
            Membership::NoActiveRoom => Transition::Joined {
                room: room.to_string(),
            },
        };
        Ok(transition)
    }

    /// Plans leaving the active room without entering another.
    #[must_use]
    pub fn plan_leave(&self) -> Transition {
        match &self.state {
            Membership::NoActiveRoom => Transition::Unchanged,
            Membership::ActiveRoom(room) => Transition::Left { room: room.clone() },
        }
    }

    /// Commits a planned transition.
    pub fn apply(&mut self, transition: &Transition) {
        match transition {
            Transition::Unchanged => {}
            Transition::Joined { room } | Transition::Switched { to: room, .. } => {
                self.state = Membership::ActiveRoom(room.clone());
            }
            Transition::Left { .. } => {
                self.state = Membership::NoActiveRoom;
            }
        }
        tracing::debug!(state = %self.state, "membership updated");
    }

    /// Plans and commits a switch to `room` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRoom`] if `room` is blank; the state
    /// is left untouched.
    pub fn switch_to(&mut self, room: &str) -> Result<Transition, ValidationError> {
        let transition = self.plan_switch(room)?;
        self.apply(&transition);
        Ok(transition)
    }

    /// Plans and commits leaving the active room.
    pub fn leave(&mut self) -> Transition {
        let transition = self.plan_leave();
        self.apply(&transition);
        transition
    }
}
