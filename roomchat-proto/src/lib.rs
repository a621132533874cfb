//! Shared protocol definitions for the `RoomChat` wire format.

pub mod codec;
pub mod envelope;
