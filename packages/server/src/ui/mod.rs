//! Signaling server: HTTP/WebSocket surface built on axum.

mod error;
mod handler;
mod server;
mod signal;
pub mod state;

pub use error::ServerError;
pub use server::{BoundServer, DEFAULT_PORT, DEFAULT_PORT_ATTEMPTS, Server, ServerConfig};
