//! Data Transfer Objects (DTOs) for the HTTP API.
//!
//! The WebSocket side speaks the pipe-delimited frame format from
//! `parley_shared::protocol` and needs no DTOs.

pub mod conversion;
pub mod http;
