//! Message formatting utilities for the terminal client.

use std::{io::Write, net::Ipv4Addr};

use parley_shared::{protocol::Frame, time::millis_to_rfc3339};

use crate::meeting::{MediaControls, MeetingEvent, MeetingInfo, Role};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(username: &str) {
    print!("{}> ", username);
    std::io::stdout().flush().ok();
}

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Render a meeting event
    pub fn format_event(event: &MeetingEvent, me: &str) -> String {
        match event {
            MeetingEvent::Created(info) => Self::format_meeting_summary(info, Role::Host, me),
            MeetingEvent::Joined(info) => {
                Self::format_meeting_summary(info, Role::Participant, me)
            }
            MeetingEvent::Left(meeting_id) => format!("\nYou left meeting {}\n", meeting_id),
            MeetingEvent::Ended { meeting_id, by } => Self::format_meeting_ended(
                meeting_id.as_str(),
                if by == me { "you" } else { by.as_str() },
            ),
            MeetingEvent::Announced { meeting_id, host } => {
                format!("\n* {} started meeting {}\n", host, meeting_id)
            }
            MeetingEvent::ParticipantJoined { username, .. } => {
                Self::format_participant_joined(username)
            }
            MeetingEvent::ParticipantLeft { username, .. } => {
                Self::format_participant_left(username)
            }
            MeetingEvent::Chat {
                room_id,
                sender,
                text,
            } => Self::format_chat_message(room_id, sender, text),
            MeetingEvent::MediaStatus { sender, status, .. } => {
                format!("\n~ {} {}\n", sender, status)
            }
            MeetingEvent::ControlsChanged(controls) => Self::format_controls(controls),
            MeetingEvent::RemoteMute { muted, by } => {
                let verb = if *muted { "muted" } else { "unmuted" };
                format!("\n! {} {} everyone\n", by, verb)
            }
            MeetingEvent::System(text) => format!("\n[server] {}\n", text),
            MeetingEvent::Relay(frame) => Self::format_raw_frame(frame),
        }
    }

    /// Meeting header with its participant list
    ///
    /// # Arguments
    ///
    /// * `info` - The meeting
    /// * `role` - This client's role in it
    /// * `me` - This client's username (marked "(me)")
    pub fn format_meeting_summary(info: &MeetingInfo, role: Role, me: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str(&format!(
            "Meeting {} ({}), created at {}\n",
            info.meeting_id,
            role,
            millis_to_rfc3339(info.created_at)
        ));
        output.push_str("Participants:\n");

        for participant in &info.participants {
            let mut suffix = String::new();
            if info.is_host(participant) {
                suffix.push_str(" (host)");
            }
            if participant == me {
                suffix.push_str(" (me)");
            }
            output.push_str(&format!("{}{}\n", participant, suffix));
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_participant_joined(username: &str) -> String {
        format!("\n+ {} joined\n", username)
    }

    pub fn format_participant_left(username: &str) -> String {
        format!("\n- {} left\n", username)
    }

    pub fn format_meeting_ended(meeting_id: &str, by: &str) -> String {
        format!("\nMeeting {} was ended by {}\n", meeting_id, by)
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `room_id` - Meeting id, or `global`
    /// * `from` - The sender's username
    /// * `content` - The message content
    pub fn format_chat_message(room_id: &str, from: &str, content: &str) -> String {
        format!(
            "\n\n{rule}\n\
             [{}] @{}: {}\n\
             {rule}\n",
            room_id,
            from,
            content,
            rule = THIN_RULE
        )
    }

    pub fn format_controls(controls: &MediaControls) -> String {
        fn flag(on: bool) -> &'static str {
            if on { "on" } else { "off" }
        }
        format!(
            "\nmuted: {} | video: {} | recording: {} | deafened: {} | all muted: {}\n",
            flag(controls.audio_muted()),
            flag(controls.video_on()),
            flag(controls.recording()),
            flag(controls.deafened()),
            flag(controls.all_muted())
        )
    }

    pub fn format_connection_status(connected: bool, message: &str) -> String {
        let marker = if connected { "online" } else { "offline" };
        format!("\n[{}] {}\n", marker, message)
    }

    /// The choices offered when automatic retry is suspended
    pub fn format_fallback_prompt(url: Option<&str>, failures: u32) -> String {
        format!(
            "\n{rule}\n\
             Lost the signaling server{} after {} failed checks.\n\
             /discover         scan the local network\n\
             /connect <addr>   enter an address (ip, ip:port or ws:// URL)\n\
             /localhost        use ws://localhost:8887/ws\n\
             /retry            keep retrying automatically\n\
             {rule}\n",
            url.map(|u| format!(" at {}", u)).unwrap_or_default(),
            failures,
            rule = RULE
        )
    }

    pub fn format_candidates(candidates: &[String]) -> String {
        let mut output = String::from("\nServers found:\n");
        for (index, url) in candidates.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", index + 1, url));
        }
        output.push_str("Use /connect <url> to pick one.\n");
        output
    }

    /// Guidance when discovery finds nothing
    pub fn format_no_servers(local_addrs: &[Ipv4Addr]) -> String {
        let mut output = String::from("\nNo signaling server responded on the local network.\n");
        if local_addrs.is_empty() {
            output.push_str("This machine has no usable IPv4 address.\n");
        } else {
            output.push_str("This machine's addresses:\n");
            for addr in local_addrs {
                output.push_str(&format!("  {}\n", addr));
            }
        }
        output.push_str("Start parley-server on one of them or use /connect <addr>.\n");
        output
    }

    /// Format a frame the client does not interpret
    pub fn format_raw_frame(frame: &Frame) -> String {
        format!("\n<- Received: {}\n", frame)
    }
}
