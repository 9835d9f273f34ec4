//! UseCase テスト用のヘルパー

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};

/// 送信内容を記録するだけの MessagePusher
#[derive(Default)]
pub struct RecordingPusher {
    pub pushed: Mutex<Vec<(ConnectionId, String)>>,
    pub broadcasts: Mutex<Vec<(Vec<ConnectionId>, String)>>,
}

impl RecordingPusher {
    pub fn pushed(&self) -> Vec<(ConnectionId, String)> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> Vec<(Vec<ConnectionId>, String)> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(&self, _connection_id: ConnectionId, _sender: PusherChannel) {
        // No-op for mock
    }

    async fn unregister_client(&self, _connection_id: &ConnectionId) {
        // No-op for mock
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        self.pushed
            .lock()
            .unwrap()
            .push((*connection_id, content.to_string()));
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        content: &str,
    ) -> Result<usize, MessagePushError> {
        let delivered = targets.len();
        self.broadcasts
            .lock()
            .unwrap()
            .push((targets, content.to_string()));
        Ok(delivered)
    }
}
