//! `RoomChat` -- room-scoped real-time chat client library.

pub mod chat;
pub mod config;
pub mod directory;
pub mod load;
pub mod net;
pub mod transport;
