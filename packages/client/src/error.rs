//! Error types for the Parley client.

use parley_shared::protocol::FrameError;
use thiserror::Error;

use crate::meeting::MeetingId;

/// Transport and connection-state errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Nothing is connected; sends fail fast and are never buffered
    #[error("Not connected to the signaling server")]
    NotConnected,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out connecting to {0}")]
    Timeout(String),

    #[error("Invalid server address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("A connection monitor is already running")]
    MonitorAlreadyRunning,

    #[error("No server URL has been configured")]
    NoServerUrl,
}

/// Meeting Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Meeting store unavailable: {0}")]
    Unavailable(String),
}

/// Follow-up action the caller may offer the user after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Create a new meeting under the id that could not be joined
    CreateMeeting(MeetingId),
}

/// Meeting coordination errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeetingError {
    #[error("Meeting ID '{0}' must be exactly 6 digits")]
    InvalidMeetingId(String),

    #[error("Meeting {0} was not found")]
    MeetingNotFound(MeetingId),

    #[error("Already in meeting {0}; leave it first")]
    AlreadyInMeeting(MeetingId),

    #[error("Not in a meeting")]
    NotInMeeting,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Could not find a free meeting ID after {0} attempts")]
    MeetingIdUnavailable(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MeetingError {
    /// Recovery action to offer, if any
    pub fn recovery(&self) -> Option<Recovery> {
        match self {
            Self::MeetingNotFound(id) => Some(Recovery::CreateMeeting(id.clone())),
            _ => None,
        }
    }
}
