//! Infrastructure layer: concrete registry, pusher and HTTP DTOs.

pub mod dto;
pub mod message_pusher;
pub mod repository;
