//! Meeting Store: the persistent record of meetings, hosts and participants.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::MeetingId;
use crate::error::StoreError;

/// Meeting records shared by every client.
///
/// Implementations may be remote; every call can fail with
/// [`StoreError::Unavailable`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn exists(&self, meeting_id: &MeetingId) -> Result<bool, StoreError>;

    /// Username of the meeting's host, `None` if the meeting is unknown
    async fn host(&self, meeting_id: &MeetingId) -> Result<Option<String>, StoreError>;

    async fn save(
        &self,
        meeting_id: &MeetingId,
        host: &str,
        title: &str,
        note: &str,
    ) -> Result<(), StoreError>;

    async fn add_participant(
        &self,
        meeting_id: &MeetingId,
        username: &str,
    ) -> Result<(), StoreError>;

    async fn remove_participant(
        &self,
        meeting_id: &MeetingId,
        username: &str,
    ) -> Result<(), StoreError>;

    async fn remove(&self, meeting_id: &MeetingId) -> Result<(), StoreError>;

    async fn participants(&self, meeting_id: &MeetingId) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredMeeting {
    host: String,
    title: String,
    note: String,
    participants: Vec<String>,
}

/// In-process store, used when no external store is configured and in tests
#[derive(Debug, Default)]
pub struct InMemoryMeetingStore {
    meetings: RwLock<HashMap<MeetingId, StoredMeeting>>,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Title and note as saved
    pub async fn details(&self, meeting_id: &MeetingId) -> Option<(String, String)> {
        self.meetings
            .read()
            .await
            .get(meeting_id)
            .map(|m| (m.title.clone(), m.note.clone()))
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn exists(&self, meeting_id: &MeetingId) -> Result<bool, StoreError> {
        Ok(self.meetings.read().await.contains_key(meeting_id))
    }

    async fn host(&self, meeting_id: &MeetingId) -> Result<Option<String>, StoreError> {
        Ok(self
            .meetings
            .read()
            .await
            .get(meeting_id)
            .map(|m| m.host.clone()))
    }

    async fn save(
        &self,
        meeting_id: &MeetingId,
        host: &str,
        title: &str,
        note: &str,
    ) -> Result<(), StoreError> {
        let mut meetings = self.meetings.write().await;
        let participants = meetings
            .remove(meeting_id)
            .map(|m| m.participants)
            .unwrap_or_default();
        meetings.insert(
            meeting_id.clone(),
            StoredMeeting {
                host: host.to_string(),
                title: title.to_string(),
                note: note.to_string(),
                participants,
            },
        );
        Ok(())
    }

    async fn add_participant(
        &self,
        meeting_id: &MeetingId,
        username: &str,
    ) -> Result<(), StoreError> {
        match self.meetings.write().await.get_mut(meeting_id) {
            Some(meeting) => {
                if !meeting.participants.iter().any(|p| p == username) {
                    meeting.participants.push(username.to_string());
                }
            }
            None => tracing::debug!(
                "Ignoring participant {} for unknown meeting {}",
                username,
                meeting_id
            ),
        }
        Ok(())
    }

    async fn remove_participant(
        &self,
        meeting_id: &MeetingId,
        username: &str,
    ) -> Result<(), StoreError> {
        if let Some(meeting) = self.meetings.write().await.get_mut(meeting_id) {
            meeting.participants.retain(|p| p != username);
        }
        Ok(())
    }

    async fn remove(&self, meeting_id: &MeetingId) -> Result<(), StoreError> {
        self.meetings.write().await.remove(meeting_id);
        Ok(())
    }

    async fn participants(&self, meeting_id: &MeetingId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .meetings
            .read()
            .await
            .get(meeting_id)
            .map(|m| m.participants.clone())
            .unwrap_or_default())
    }
}
