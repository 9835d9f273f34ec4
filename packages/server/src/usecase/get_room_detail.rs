//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, Room, RoomId};

use super::error::GetRoomDetailError;

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl GetRoomDetailUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// ルーム詳細を取得する
    ///
    /// `global` はルームとして存在しないため常に `RoomNotFound` になる。
    pub async fn execute(&self, room_id: String) -> Result<Room, GetRoomDetailError> {
        let room_id = RoomId::new(room_id).map_err(|_| GetRoomDetailError::InvalidRoomId)?;
        self.registry
            .room(&room_id)
            .await
            .ok_or(GetRoomDetailError::RoomNotFound)
    }
}
