//! UseCase: 切断処理

use std::sync::Arc;

use parley_shared::protocol::{Frame, MessageType};

use crate::domain::{ConnectionId, ConnectionRegistry, MessagePusher};

use super::error::DisconnectError;

/// 切断時に合成する USER_LEFT のペイロード
const DISCONNECTED_PAYLOAD: &str = "Disconnected";

/// 切断のユースケース
///
/// 接続をレジストリから外し、身元が分かっていればそのルームの残りのメンバーに
/// `USER_LEFT` を合成して送る。
pub struct DisconnectClientUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectClientUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
        }
    }

    /// 切断を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ConnectionId>)` - USER_LEFT の通知先（身元が未知なら空）
    /// * `Err(DisconnectError)` - 接続が登録されていない
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Vec<ConnectionId>, DisconnectError> {
        self.message_pusher.unregister_client(&connection_id).await;

        let identity = self
            .registry
            .remove(&connection_id)
            .await
            .ok_or_else(|| DisconnectError::UnknownConnection(connection_id.to_string()))?;

        // 身元が未知なら誰にも知らせない
        let Some(username) = identity
            .username
            .as_ref()
            .filter(|_| !identity.room_id.is_global())
        else {
            return Ok(Vec::new());
        };

        let notify_targets = self.registry.room_members(&identity.room_id).await;
        if notify_targets.is_empty() {
            return Ok(notify_targets);
        }

        let frame = Frame::new(
            MessageType::UserLeft,
            identity.room_id.as_str(),
            username.as_str(),
            DISCONNECTED_PAYLOAD,
        );
        self.message_pusher
            .broadcast(notify_targets.clone(), &frame.encode())
            .await
            .map_err(|e| DisconnectError::BroadcastFailed(e.to_string()))?;

        Ok(notify_targets)
    }
}
