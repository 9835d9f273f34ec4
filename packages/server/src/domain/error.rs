//! Domain error types.

use thiserror::Error;

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("'{0}' is not a valid connection id")]
    InvalidConnectionId(String),
}

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("connection '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),
}

/// Message delivery errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' has no outbound channel")]
    ClientNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),
}
