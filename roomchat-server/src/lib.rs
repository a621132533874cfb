//! `RoomChat` server library.
//!
//! Exposes the server for use in tests and embedding. The server accepts
//! WebSocket connections, tracks room membership per connection, and fans
//! chat envelopes out to room members.

pub mod config;
pub mod rooms;
pub mod server;
