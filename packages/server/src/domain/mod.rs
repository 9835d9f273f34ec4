//! Domain layer: value objects, entities and the interfaces the use cases depend on.

pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use entity::{Identity, Member, Room};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use repository::ConnectionRegistry;
pub use value_object::{ConnectionId, RoomId, Timestamp, Username};
