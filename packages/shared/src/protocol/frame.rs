//! Frame encoding and decoding.

use std::{fmt, str::FromStr};

use super::{FrameError, MessageType};

/// Reserved room id for server-wide broadcast
pub const GLOBAL_ROOM: &str = "global";

/// Field separator on the wire
pub const FIELD_DELIMITER: char = '|';

/// Sender name the server uses for frames it originates
pub const SERVER_SENDER: &str = "server";

/// Sender name given to text that could not be decoded
pub const UNKNOWN_SENDER: &str = "unknown";

/// A decoded signaling message.
///
/// Only the payload may contain `|`; decoding splits on the first three
/// delimiters and keeps the remainder intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageType,
    pub room_id: String,
    pub sender: String,
    pub payload: String,
}

impl Frame {
    pub fn new(
        kind: MessageType,
        room_id: impl Into<String>,
        sender: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            sender: sender.into(),
            payload: payload.into(),
        }
    }

    /// The greeting a server sends on every new connection
    pub fn welcome() -> Self {
        Self::new(
            MessageType::Welcome,
            GLOBAL_ROOM,
            SERVER_SENDER,
            "Connected to signaling server",
        )
    }

    /// Wrap text that failed to decode as a global chat message
    pub fn wrap_unparsed(raw: &str) -> Self {
        Self::new(MessageType::Chat, GLOBAL_ROOM, UNKNOWN_SENDER, raw)
    }

    pub fn is_global(&self) -> bool {
        self.room_id == GLOBAL_ROOM
    }

    /// Check that the header fields survive a round trip
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.kind.as_str().is_empty() {
            return Err(FrameError::EmptyType);
        }
        if self.room_id.is_empty() {
            return Err(FrameError::EmptyRoom);
        }
        for (field, value) in [
            ("type", self.kind.as_str()),
            ("room_id", self.room_id.as_str()),
            ("sender", self.sender.as_str()),
        ] {
            if value.contains(FIELD_DELIMITER) {
                return Err(FrameError::DelimiterInHeader { field });
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.kind,
            self.room_id,
            self.sender,
            self.payload,
            d = FIELD_DELIMITER
        )
    }

    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let mut fields = raw.splitn(4, FIELD_DELIMITER);
        let (Some(kind), Some(room_id), Some(sender), Some(payload)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(FrameError::MissingFields {
                found: raw.split(FIELD_DELIMITER).count(),
            });
        };

        if kind.is_empty() {
            return Err(FrameError::EmptyType);
        }
        if room_id.is_empty() {
            return Err(FrameError::EmptyRoom);
        }

        Ok(Self::new(MessageType::from(kind), room_id, sender, payload))
    }
}

impl FromStr for Frame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
