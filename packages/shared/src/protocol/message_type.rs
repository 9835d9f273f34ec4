//! Message type tags carried in the first frame field.

use std::fmt;

/// Known message types plus a passthrough variant for anything else.
///
/// The server forwards unknown types unchanged, so `Unknown` keeps the
/// original tag text for re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Welcome,
    Chat,
    UserJoined,
    UserLeft,
    MeetingCreated,
    MeetingEnded,
    VideoStatus,
    VideoFrame,
    AudioStatus,
    AudioControl,
    VideoControl,
    FileTransfer,
    WebrtcSignal,
    ValidateMeeting,
    Unknown(String),
}

impl MessageType {
    /// Wire representation of the tag
    pub fn as_str(&self) -> &str {
        match self {
            Self::Welcome => "WELCOME",
            Self::Chat => "CHAT",
            Self::UserJoined => "USER_JOINED",
            Self::UserLeft => "USER_LEFT",
            Self::MeetingCreated => "MEETING_CREATED",
            Self::MeetingEnded => "MEETING_ENDED",
            Self::VideoStatus => "VIDEO_STATUS",
            Self::VideoFrame => "VIDEO_FRAME",
            Self::AudioStatus => "AUDIO_STATUS",
            Self::AudioControl => "AUDIO_CONTROL",
            Self::VideoControl => "VIDEO_CONTROL",
            Self::FileTransfer => "FILE_TRANSFER",
            Self::WebrtcSignal => "WEBRTC_SIGNAL",
            Self::ValidateMeeting => "VALIDATE_MEETING",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether this is one of the protocol's known tags
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        match tag {
            "WELCOME" => Self::Welcome,
            "CHAT" => Self::Chat,
            "USER_JOINED" => Self::UserJoined,
            "USER_LEFT" => Self::UserLeft,
            "MEETING_CREATED" => Self::MeetingCreated,
            "MEETING_ENDED" => Self::MeetingEnded,
            "VIDEO_STATUS" => Self::VideoStatus,
            "VIDEO_FRAME" => Self::VideoFrame,
            "AUDIO_STATUS" => Self::AudioStatus,
            "AUDIO_CONTROL" => Self::AudioControl,
            "VIDEO_CONTROL" => Self::VideoControl,
            "FILE_TRANSFER" => Self::FileTransfer,
            "WEBRTC_SIGNAL" => Self::WebrtcSignal,
            "VALIDATE_MEETING" => Self::ValidateMeeting,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
