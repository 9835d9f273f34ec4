//! Conversion logic from domain entities to HTTP DTOs.

use parley_shared::time::millis_to_rfc3339;

use crate::domain::{Member, Room};
use crate::infrastructure::dto::http::{ParticipantDetailDto, RoomDetailDto, RoomSummaryDto};

impl From<Room> for RoomSummaryDto {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            participants: room
                .members
                .iter()
                .map(|m| match &m.username {
                    Some(name) => name.as_str().to_string(),
                    None => m.connection_id.to_string(),
                })
                .collect(),
        }
    }
}

impl From<Member> for ParticipantDetailDto {
    fn from(member: Member) -> Self {
        Self {
            connection_id: member.connection_id.to_string(),
            username: member.username.map(|name| name.as_str().to_string()),
            connected_at: millis_to_rfc3339(member.connected_at.value()),
        }
    }
}

impl From<Room> for RoomDetailDto {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            participants: room.members.into_iter().map(Into::into).collect(),
        }
    }
}
