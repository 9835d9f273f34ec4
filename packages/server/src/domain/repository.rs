//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{ConnectionId, Identity, RepositoryError, Room, RoomId, Timestamp, Username};

/// 接続レジストリ trait
///
/// 接続 → 身元（ユーザー名, ルーム）と、ルーム → メンバー集合の二つの対応を
/// 一貫した状態で保持する。
///
/// ## 不変条件
///
/// - 接続はちょうど一つのルーム（`global` を含む）に属する
/// - 空のルームは存在しない
/// - `global` はルーム一覧に現れない
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 接続を未知の身元（`global`）で登録
    async fn register(
        &self,
        connection_id: ConnectionId,
        connected_at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 身元を更新し、必要ならルームを移動する
    ///
    /// 移動前のルームが空になった場合はそのルームを削除する。
    /// 戻り値は移動前のルーム ID（移動がなければ `None`）。
    async fn upsert_identity(
        &self,
        connection_id: &ConnectionId,
        username: Option<Username>,
        room_id: RoomId,
    ) -> Result<Option<RoomId>, RepositoryError>;

    /// 接続を global に戻す（ユーザー名は保持する）
    ///
    /// 退出したルームが空になった場合はそのルームを削除する。
    /// 戻り値は退出したルーム ID（すでに global なら `None`）。
    async fn leave_to_global(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<RoomId>, RepositoryError>;

    /// ルームを閉じ、全メンバーを global に戻す
    ///
    /// 戻り値は global に戻した接続 ID。
    async fn close_room(&self, room_id: &RoomId) -> Vec<ConnectionId>;

    /// 接続を削除し、最後の身元を返す
    async fn remove(&self, connection_id: &ConnectionId) -> Option<Identity>;

    /// 接続の現在の身元
    async fn identity(&self, connection_id: &ConnectionId) -> Option<Identity>;

    /// ルームのメンバーの接続 ID
    async fn room_members(&self, room_id: &RoomId) -> Vec<ConnectionId>;

    /// 接続中の全ての接続 ID
    async fn all_connection_ids(&self) -> Vec<ConnectionId>;

    /// ルーム一覧（`global` を除く）
    async fn rooms(&self) -> Vec<Room>;

    /// ルーム詳細
    async fn room(&self, room_id: &RoomId) -> Option<Room>;

    /// 接続数
    async fn count_connections(&self) -> usize;
}
