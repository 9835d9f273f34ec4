//! Wire protocol: one text frame per WebSocket message, `TYPE|ROOM_ID|SENDER|PAYLOAD`.

mod error;
mod frame;
mod message_type;

pub use error::FrameError;
pub use frame::{FIELD_DELIMITER, Frame, GLOBAL_ROOM, SERVER_SENDER, UNKNOWN_SENDER};
pub use message_type::MessageType;
