//! InMemory 接続レジストリ実装
//!
//! ドメイン層が定義する ConnectionRegistry trait の具体的な実装。
//! 接続表とルーム表を一つのロックの下に置き、二つの対応が常に一致するようにします。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    ConnectionId, ConnectionRegistry, Identity, Member, RepositoryError, Room, RoomId, Timestamp,
    Username,
};

struct ConnectionEntry {
    identity: Identity,
    connected_at: Timestamp,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// global 以外のルームのみ。値が空になったエントリは即座に削除する
    rooms: BTreeMap<RoomId, BTreeSet<ConnectionId>>,
}

impl RegistryState {
    fn leave_room(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        if room_id.is_global() {
            return;
        }
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(connection_id);
            if members.is_empty() {
                self.rooms.remove(room_id);
                tracing::debug!("Room '{}' is empty and has been removed", room_id);
            }
        }
    }

    fn snapshot(&self, room_id: &RoomId, members: &BTreeSet<ConnectionId>) -> Room {
        Room {
            id: room_id.clone(),
            members: members
                .iter()
                .filter_map(|id| {
                    self.connections.get(id).map(|entry| Member {
                        connection_id: *id,
                        username: entry.identity.username.clone(),
                        connected_at: entry.connected_at,
                    })
                })
                .collect(),
        }
    }
}

/// インメモリ接続レジストリ
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(
        &self,
        connection_id: ConnectionId,
        connected_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.connections.contains_key(&connection_id) {
            return Err(RepositoryError::AlreadyRegistered(connection_id.to_string()));
        }
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                identity: Identity::unknown(),
                connected_at,
            },
        );
        Ok(())
    }

    async fn upsert_identity(
        &self,
        connection_id: &ConnectionId,
        username: Option<Username>,
        room_id: RoomId,
    ) -> Result<Option<RoomId>, RepositoryError> {
        let mut state = self.state.write().await;

        let previous_room = match state.connections.get_mut(connection_id) {
            Some(entry) => {
                let previous = entry.identity.room_id.clone();
                if username.is_some() {
                    entry.identity.username = username;
                }
                entry.identity.room_id = room_id.clone();
                previous
            }
            None => {
                return Err(RepositoryError::ConnectionNotFound(
                    connection_id.to_string(),
                ));
            }
        };

        if previous_room == room_id {
            return Ok(None);
        }

        state.leave_room(&previous_room, connection_id);
        if !room_id.is_global() {
            state
                .rooms
                .entry(room_id)
                .or_default()
                .insert(*connection_id);
        }

        Ok(Some(previous_room))
    }

    async fn leave_to_global(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<RoomId>, RepositoryError> {
        let mut state = self.state.write().await;

        let previous_room = match state.connections.get_mut(connection_id) {
            Some(entry) => std::mem::replace(&mut entry.identity.room_id, RoomId::global()),
            None => {
                return Err(RepositoryError::ConnectionNotFound(
                    connection_id.to_string(),
                ));
            }
        };

        if previous_room.is_global() {
            return Ok(None);
        }
        state.leave_room(&previous_room, connection_id);
        Ok(Some(previous_room))
    }

    async fn close_room(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut state = self.state.write().await;
        let Some(members) = state.rooms.remove(room_id) else {
            return Vec::new();
        };
        for id in &members {
            if let Some(entry) = state.connections.get_mut(id) {
                entry.identity.room_id = RoomId::global();
            }
        }
        tracing::debug!("Room '{}' closed with {} member(s)", room_id, members.len());
        members.into_iter().collect()
    }

    async fn remove(&self, connection_id: &ConnectionId) -> Option<Identity> {
        let mut state = self.state.write().await;
        let entry = state.connections.remove(connection_id)?;
        state.leave_room(&entry.identity.room_id, connection_id);
        Some(entry.identity)
    }

    async fn identity(&self, connection_id: &ConnectionId) -> Option<Identity> {
        let state = self.state.read().await;
        state
            .connections
            .get(connection_id)
            .map(|entry| entry.identity.clone())
    }

    async fn room_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    async fn all_connection_ids(&self) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state.connections.keys().copied().collect()
    }

    async fn rooms(&self) -> Vec<Room> {
        let state = self.state.read().await;
        state
            .rooms
            .iter()
            .map(|(id, members)| state.snapshot(id, members))
            .collect()
    }

    async fn room(&self, room_id: &RoomId) -> Option<Room> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room_id)
            .map(|members| state.snapshot(room_id, members))
    }

    async fn count_connections(&self) -> usize {
        let state = self.state.read().await;
        state.connections.len()
    }
}
