//! Meeting/session coordination.

mod controls;
mod coordinator;
mod event;
mod info;
mod store;

pub use controls::{ControlSignal, MediaControls};
pub use coordinator::{CoordinatorConfig, MeetingCoordinator, Role};
pub use event::{MeetingEvent, MeetingListener};
pub use info::{MeetingId, MeetingInfo};
pub use store::{InMemoryMeetingStore, MeetingStore};

#[cfg(test)]
pub use store::MockMeetingStore;
