//! Parley signaling client.
//!
//! - [`connection`]: one resilient WebSocket link with liveness monitoring,
//!   automatic reconnection, fallback decisions and LAN discovery
//! - [`meeting`]: meeting/session coordination on top of that link
//! - [`command`], [`formatter`]: input parsing and terminal rendering used by
//!   the `parley-client` binary

pub mod command;
pub mod connection;
pub mod error;
pub mod formatter;
pub mod meeting;
