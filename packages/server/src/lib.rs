//! Parley signaling server.
//!
//! Accepts WebSocket connections, tracks which connection belongs to which
//! meeting room, and relays pipe-delimited frames either server-wide
//! (`global`) or strictly within a room.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
