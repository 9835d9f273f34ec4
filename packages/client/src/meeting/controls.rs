//! Local media control flags.

use parley_shared::protocol::MessageType;

/// Frame a toggle asks to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSignal {
    pub kind: MessageType,
    pub payload: &'static str,
}

impl ControlSignal {
    fn new(kind: MessageType, payload: &'static str) -> Self {
        Self { kind, payload }
    }
}

/// Audio/video/recording state for the local user.
///
/// Every toggle flips one flag and derives its signal from the value after
/// the flip, so applying the same toggle twice always restores the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaControls {
    audio_muted: bool,
    video_on: bool,
    recording: bool,
    deafened: bool,
    all_muted: bool,
}

impl MediaControls {
    pub fn audio_muted(&self) -> bool {
        self.audio_muted
    }

    pub fn video_on(&self) -> bool {
        self.video_on
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn deafened(&self) -> bool {
        self.deafened
    }

    pub fn all_muted(&self) -> bool {
        self.all_muted
    }

    pub fn toggle_audio(&mut self) -> ControlSignal {
        self.audio_muted = !self.audio_muted;
        let payload = if self.audio_muted { "muted" } else { "unmuted" };
        ControlSignal::new(MessageType::AudioStatus, payload)
    }

    pub fn toggle_video(&mut self) -> ControlSignal {
        self.video_on = !self.video_on;
        let payload = if self.video_on {
            "VIDEO_STARTED"
        } else {
            "VIDEO_STOPPED"
        };
        ControlSignal::new(MessageType::VideoStatus, payload)
    }

    pub fn toggle_recording(&mut self) -> ControlSignal {
        self.recording = !self.recording;
        let payload = if self.recording {
            "START_RECORDING"
        } else {
            "STOP_RECORDING"
        };
        ControlSignal::new(MessageType::VideoControl, payload)
    }

    pub fn toggle_deafen(&mut self) -> ControlSignal {
        self.deafened = !self.deafened;
        let payload = if self.deafened {
            "deafened"
        } else {
            "undeafened"
        };
        ControlSignal::new(MessageType::AudioStatus, payload)
    }

    /// Host-only; the caller checks the role
    pub fn toggle_mute_all(&mut self) -> ControlSignal {
        self.all_muted = !self.all_muted;
        let payload = if self.all_muted {
            "MUTE_ALL"
        } else {
            "UNMUTE_ALL"
        };
        ControlSignal::new(MessageType::AudioControl, payload)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
