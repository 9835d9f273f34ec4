//! エンティティ定義

use super::{ConnectionId, RoomId, Timestamp, Username};

/// 接続に紐づく身元情報
///
/// 接続直後は `username = None`, `room_id = global` の「未知」状態。
/// global 以外のルーム宛てフレームを送ったときに更新される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: Option<Username>,
    pub room_id: RoomId,
}

impl Identity {
    /// 接続直後の未知の身元
    pub fn unknown() -> Self {
        Self {
            username: None,
            room_id: RoomId::global(),
        }
    }

    /// ルームに参加済みで、ユーザー名も分かっているか
    pub fn is_known(&self) -> bool {
        self.username.is_some() && !self.room_id.is_global()
    }
}

/// ルームのメンバー（スナップショット）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub username: Option<Username>,
    pub connected_at: Timestamp,
}

/// ルーム（スナップショット）
///
/// ルームは最初の参加で生まれ、最後のメンバーが抜けた時点で消える。
/// そのためスナップショットの `members` が空になることはない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub members: Vec<Member>,
}

impl Room {
    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection_id).collect()
    }
}
