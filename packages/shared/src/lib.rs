//! Shared building blocks for the Parley signaling relay.
//!
//! - `protocol`: the pipe-delimited wire frame and its message types
//! - `logger`: tracing subscriber setup for the binaries
//! - `time`: clock abstraction and timestamp formatting

pub mod logger;
pub mod protocol;
pub mod time;
