//! Room registry: which connections are in which resource room.
//!
//! Rooms and the per-connection reverse index live behind one lock, so a
//! connection's memberships are always a subset of the tracked rooms and an
//! empty room is never observable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use huddle_core::{ConnectionId, ResourceKey};
use metrics::gauge;
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::ClientConnection;
use crate::metrics::RELAY_ROOMS_ACTIVE;

type Members = HashMap<ConnectionId, Arc<ClientConnection>>;

#[derive(Default)]
struct RoomState {
    rooms: HashMap<ResourceKey, Members>,
    memberships: HashMap<ConnectionId, HashSet<ResourceKey>>,
}

impl RoomState {
    fn remove_member(&mut self, conn_id: &ConnectionId, key: &ResourceKey) -> bool {
        let Some(members) = self.rooms.get_mut(key) else {
            return false;
        };
        if members.remove(conn_id).is_none() {
            return false;
        }
        if members.is_empty() {
            let _ = self.rooms.remove(key);
            gauge!(RELAY_ROOMS_ACTIVE).decrement(1.0);
            debug!(resource = %key, "room removed");
        }
        true
    }
}

/// Resource rooms and their members.
#[derive(Default)]
pub struct RoomRegistry {
    state: RwLock<RoomState>,
}

impl RoomRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to the room for `key`, creating the room if needed.
    ///
    /// Idempotent. Returns the member count after the call.
    pub async fn join(&self, conn: &Arc<ClientConnection>, key: ResourceKey) -> usize {
        let mut state = self.state.write().await;
        let members = state.rooms.entry(key.clone()).or_insert_with(|| {
            gauge!(RELAY_ROOMS_ACTIVE).increment(1.0);
            debug!(resource = %key, "room created");
            HashMap::new()
        });
        let _ = members.insert(conn.id.clone(), Arc::clone(conn));
        let count = members.len();
        let _ = state
            .memberships
            .entry(conn.id.clone())
            .or_default()
            .insert(key);
        count
    }

    /// Remove the membership. Deletes the room once empty.
    ///
    /// Returns `false` when the connection was not a member.
    pub async fn leave(&self, conn_id: &ConnectionId, key: &ResourceKey) -> bool {
        let mut state = self.state.write().await;
        let removed = state.remove_member(conn_id, key);
        if let Some(keys) = state.memberships.get_mut(conn_id) {
            let _ = keys.remove(key);
            if keys.is_empty() {
                let _ = state.memberships.remove(conn_id);
            }
        }
        removed
    }

    /// Release every membership of `conn_id`. Returns the rooms left.
    pub async fn leave_all(&self, conn_id: &ConnectionId) -> Vec<ResourceKey> {
        let mut state = self.state.write().await;
        let Some(keys) = state.memberships.remove(conn_id) else {
            return Vec::new();
        };
        let mut left: Vec<ResourceKey> = keys
            .into_iter()
            .filter(|key| state.remove_member(conn_id, key))
            .collect();
        left.sort();
        left
    }

    /// Members of a room, excluding `exclude` when given.
    pub async fn recipients(
        &self,
        key: &ResourceKey,
        exclude: Option<&ConnectionId>,
    ) -> Vec<Arc<ClientConnection>> {
        let state = self.state.read().await;
        state
            .rooms
            .get(key)
            .map(|members| {
                members
                    .iter()
                    .filter(|(id, _)| Some(*id) != exclude)
                    .map(|(_, conn)| Arc::clone(conn))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connection ids in a room, sorted.
    pub async fn members(&self, key: &ResourceKey) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        let mut ids: Vec<ConnectionId> = state
            .rooms
            .get(key)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Rooms a connection is in, sorted.
    pub async fn rooms_of(&self, conn_id: &ConnectionId) -> Vec<ResourceKey> {
        let state = self.state.read().await;
        let mut keys: Vec<ResourceKey> = state
            .memberships
            .get(conn_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    /// Whether a room exists (it has at least one member).
    pub async fn contains_room(&self, key: &ResourceKey) -> bool {
        self.state.read().await.rooms.contains_key(key)
    }
}
