//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{MessagePushError, RepositoryError};

/// 接続受付のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// フレーム中継のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("connection '{0}' is not registered")]
    UnknownConnection(String),

    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
}

impl From<RepositoryError> for RouteError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::AlreadyRegistered(id) | RepositoryError::ConnectionNotFound(id) => {
                Self::UnknownConnection(id)
            }
        }
    }
}

impl From<MessagePushError> for RouteError {
    fn from(e: MessagePushError) -> Self {
        Self::BroadcastFailed(e.to_string())
    }
}

/// 切断処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    #[error("connection '{0}' is not registered")]
    UnknownConnection(String),

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
}

/// ルーム詳細取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("invalid room id")]
    InvalidRoomId,

    #[error("room not found")]
    RoomNotFound,
}
