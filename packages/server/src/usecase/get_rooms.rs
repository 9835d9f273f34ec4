//! UseCase: ルーム一覧取得

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, Room};

/// ルーム一覧取得のユースケース（`global` は含まない）
pub struct GetRoomsUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl GetRoomsUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self) -> Vec<Room> {
        self.registry.rooms().await
    }

    /// 接続中の接続数
    pub async fn count_connections(&self) -> usize {
        self.registry.count_connections().await
    }
}
