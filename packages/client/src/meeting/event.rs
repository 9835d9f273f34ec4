//! Events the coordinator reports to its listeners.

use parley_shared::protocol::{Frame, MessageType};

use super::{MediaControls, MeetingId, MeetingInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingEvent {
    /// This client created and now hosts a meeting
    Created(MeetingInfo),
    /// This client joined a meeting as a participant
    Joined(MeetingInfo),
    /// This client left a meeting it did not host
    Left(MeetingId),
    /// The active meeting ended, locally or by the host
    Ended { meeting_id: MeetingId, by: String },
    /// Another client announced a new meeting
    Announced { meeting_id: MeetingId, host: String },
    ParticipantJoined { room_id: String, username: String },
    ParticipantLeft { room_id: String, username: String },
    Chat {
        room_id: String,
        sender: String,
        text: String,
    },
    /// Another participant's audio or video status
    MediaStatus {
        sender: String,
        kind: MessageType,
        status: String,
    },
    ControlsChanged(MediaControls),
    /// The host's mute-all changed our audio
    RemoteMute { muted: bool, by: String },
    /// Server notices such as the greeting
    System(String),
    /// Frames the coordinator does not interpret
    Relay(Frame),
}

/// Receives [`MeetingEvent`]s in emission order
pub trait MeetingListener: Send + Sync {
    fn on_meeting_event(&self, event: &MeetingEvent);
}
