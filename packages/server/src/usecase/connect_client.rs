//! UseCase: 接続受付処理

use std::sync::Arc;

use parley_shared::{protocol::Frame, time::Clock};

use crate::domain::{ConnectionId, ConnectionRegistry, MessagePusher, PusherChannel, Timestamp};

use super::error::ConnectError;

/// 接続受付のユースケース
///
/// 接続を未知の身元で登録し、送信チャネルを紐づけて `WELCOME` を送る。
pub struct ConnectClientUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectClientUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            clock,
        }
    }

    /// 接続受付を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Timestamp)` - 接続時刻
    /// * `Err(ConnectError)` - 同じ接続 ID が既に登録済み
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        sender: PusherChannel,
    ) -> Result<Timestamp, ConnectError> {
        let connected_at = Timestamp::new(self.clock.now_millis());

        // 1. レジストリに登録（global, 未知の身元）
        self.registry
            .register(connection_id, connected_at)
            .await
            .map_err(|_| ConnectError::AlreadyRegistered(connection_id.to_string()))?;

        // 2. 送信チャネルを登録
        self.message_pusher
            .register_client(connection_id, sender)
            .await;

        // 3. WELCOME を送信（失敗しても接続は維持する）
        if let Err(e) = self
            .message_pusher
            .push_to(&connection_id, &Frame::welcome().encode())
            .await
        {
            tracing::warn!("Failed to send welcome to '{}': {}", connection_id, e);
        }

        Ok(connected_at)
    }
}
