//! UseCase: フレーム中継処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RouteMessageUseCase::execute() メソッド
//! - 宛先の選定（global は全接続、それ以外はルームのメンバーのみ）と身元の更新
//!
//! ### なぜこのテストが必要か
//! - ルーム宛てのフレームが別ルームに漏れないことを保証する
//! - 送信者自身にエコーされないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：global 宛て、ルーム宛て
//! - エッジケース：デコードできないテキスト、未知のタイプ、ルーム移動、USER_LEFT による退出
//! - 異常系：未登録の接続からの送信

use std::sync::Arc;

use parley_shared::protocol::{Frame, MessageType};

use crate::domain::{ConnectionId, ConnectionRegistry, MessagePusher, RoomId, Username};

use super::error::RouteError;

/// 中継結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// 中継したフレーム（デコードできなかった場合は包んだもの）
    pub frame: Frame,
    /// 宛先として選んだ接続
    pub targets: Vec<ConnectionId>,
    /// 実際に送信チャネルへ渡せた数
    pub delivered: usize,
}

/// フレーム中継のユースケース
pub struct RouteMessageUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl RouteMessageUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
        }
    }

    /// 受信したテキストを中継する
    ///
    /// デコードできたフレームは受信したテキストをそのまま転送し、
    /// デコードできなかったテキストは `CHAT|global|unknown|<text>` に包んで全体へ送る。
    /// ルーム宛ての `USER_LEFT` は転送した後に送信者をルームから外して global に戻し、
    /// `MEETING_ENDED` は転送した後にルームを閉じる。
    pub async fn execute(
        &self,
        from: ConnectionId,
        raw: &str,
    ) -> Result<RouteOutcome, RouteError> {
        let (frame, wire) = match Frame::decode(raw) {
            Ok(frame) => (frame, raw.to_string()),
            Err(e) => {
                tracing::debug!("Wrapping undecodable text from '{}': {}", from, e);
                let frame = Frame::wrap_unparsed(raw);
                let wire = frame.encode();
                (frame, wire)
            }
        };

        let targets = if frame.is_global() {
            self.registry
                .all_connection_ids()
                .await
                .into_iter()
                .filter(|id| *id != from)
                .collect::<Vec<_>>()
        } else {
            let room_id = RoomId::new(frame.room_id.clone())
                .map_err(|e| RouteError::InvalidRoomId(e.to_string()))?;
            let username = Username::new(frame.sender.clone()).ok();

            if let Some(previous) = self
                .registry
                .upsert_identity(&from, username, room_id.clone())
                .await?
            {
                tracing::info!(
                    "Connection '{}' moved from room '{}' to '{}'",
                    from,
                    previous,
                    room_id
                );
            }

            self.registry
                .room_members(&room_id)
                .await
                .into_iter()
                .filter(|id| *id != from)
                .collect::<Vec<_>>()
        };

        let delivered = self
            .message_pusher
            .broadcast(targets.clone(), &wire)
            .await?;

        tracing::debug!(
            "Routed {} frame in room '{}' from '{}' to {} connection(s)",
            frame.kind,
            frame.room_id,
            from,
            delivered
        );

        if !frame.is_global() {
            self.release_membership(from, &frame).await?;
        }

        Ok(RouteOutcome {
            frame,
            targets,
            delivered,
        })
    }

    async fn release_membership(
        &self,
        from: ConnectionId,
        frame: &Frame,
    ) -> Result<(), RouteError> {
        match frame.kind {
            MessageType::UserLeft => {
                if let Some(left) = self.registry.leave_to_global(&from).await? {
                    tracing::info!("Connection '{}' left room '{}'", from, left);
                }
            }
            MessageType::MeetingEnded => {
                let room_id = RoomId::new(frame.room_id.clone())
                    .map_err(|e| RouteError::InvalidRoomId(e.to_string()))?;
                let released = self.registry.close_room(&room_id).await;
                tracing::info!(
                    "Room '{}' closed by '{}', {} connection(s) returned to global",
                    room_id,
                    from,
                    released.len()
                );
            }
            _ => {}
        }
        Ok(())
    }
}
