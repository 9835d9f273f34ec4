//! Client-side connection management.

mod discovery;
mod liveness;
mod manager;
mod state;

pub use discovery::{
    CANONICAL_LOCAL_URL, DEFAULT_SERVER_PATH, DEFAULT_SERVER_PORT, DiscoveryConfig, Greeting,
    candidate_urls, classify_greeting, discover, discover_among, local_ipv4_addrs,
    parse_manual_address, probe,
};
pub use liveness::{LivenessAction, LivenessTracker};
pub use manager::{FallbackDecision, FallbackOutcome, ResilienceConfig, ResilienceManager};
pub use state::ConnectionState;

use parley_shared::protocol::MessageType;

use crate::error::ClientError;

/// Receives connection status changes.
///
/// Calls for one listener are serialized; they never overlap.
pub trait StatusListener: Send + Sync {
    /// Called once per change of the connected flag, never on every poll
    fn on_connection_status_changed(&self, connected: bool, message: &str);

    /// Called when automatic retry is suspended and the caller should pick a
    /// [`FallbackDecision`]
    fn on_fallback_required(&self, url: Option<&str>, failures: u32) {
        let _ = (url, failures);
    }
}

/// Outbound side of a signaling connection
pub trait SignalSender: Send + Sync {
    /// Send one frame; fails fast with [`ClientError::NotConnected`] when the link is down
    fn send(
        &self,
        kind: MessageType,
        room_id: &str,
        sender: &str,
        payload: &str,
    ) -> Result<(), ClientError>;

    fn is_connected(&self) -> bool;
}
