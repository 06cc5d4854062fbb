//! Live connections, rooms and fan-out behind one handle.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::{ConnectionId, ResourceKey, UpdateEvent, UserId};
use metrics::{counter, gauge, histogram};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::broadcast::{BroadcastOutcome, Broadcaster};
use super::connection::ClientConnection;
use super::rooms::RoomRegistry;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// The relay's shared state.
pub struct RelayHub {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    rooms: RoomRegistry,
    broadcaster: Broadcaster,
}

impl RelayHub {
    /// Empty hub evicting recipients after `max_total_drops`.
    pub fn new(max_total_drops: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RoomRegistry::new(),
            broadcaster: Broadcaster::new(max_total_drops),
        }
    }

    /// The room registry.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Track a newly authenticated connection.
    pub async fn register(&self, conn: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(conn.id.clone(), conn).is_none() {
            counter!(WS_CONNECTIONS_TOTAL).increment(1);
            gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        }
    }

    /// Release every membership of `conn_id` and forget the connection.
    ///
    /// Idempotent: returns `false` if it was already gone.
    pub async fn on_disconnect(&self, conn_id: &ConnectionId) -> bool {
        let left = self.rooms.leave_all(conn_id).await;
        let removed = self.connections.write().await.remove(conn_id);
        let Some(conn) = removed else {
            return false;
        };
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(conn.age().as_secs_f64());
        info!(
            conn_id = %conn_id,
            user_id = %conn.user_id(),
            rooms_left = left.len(),
            "connection released"
        );
        true
    }

    /// Join a room. Returns the member count.
    pub async fn join(&self, conn: &Arc<ClientConnection>, key: ResourceKey) -> usize {
        debug!(conn_id = %conn.id, resource = %key, "join");
        self.rooms.join(conn, key).await
    }

    /// Leave a room. Returns whether anything changed.
    pub async fn leave(&self, conn: &ClientConnection, key: &ResourceKey) -> bool {
        debug!(conn_id = %conn.id, resource = %key, "leave");
        self.rooms.leave(&conn.id, key).await
    }

    /// Relay `event` to the other members of `key`.
    pub async fn broadcast(
        &self,
        key: &ResourceKey,
        event: &UpdateEvent,
        origin: &ClientConnection,
    ) -> BroadcastOutcome {
        self.broadcaster
            .broadcast(&self.rooms, key, event, origin)
            .await
    }

    /// Live connection count.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every connection belonging to `user_id`. Returns how many.
    pub async fn disconnect_user(&self, user_id: &UserId) -> usize {
        let conns = self.connections.read().await;
        let mut closed = 0;
        for conn in conns.values().filter(|c| c.user_id() == user_id) {
            conn.close();
            closed += 1;
        }
        if closed > 0 {
            info!(user_id = %user_id, closed, "disconnecting user");
        }
        closed
    }

    /// Close every live connection (shutdown).
    pub async fn close_all(&self) {
        for conn in self.connections.read().await.values() {
            conn.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::connection;

    #[tokio::test]
    async fn register_and_disconnect() {
        let hub = RelayHub::new(100);
        let (a, _ra) = connection("a", "alice", 4);
        hub.register(Arc::clone(&a)).await;
        assert_eq!(hub.connection_count().await, 1);

        let _ = hub.join(&a, ResourceKey::page("1").unwrap()).await;
        assert!(hub.on_disconnect(&a.id).await);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.rooms().room_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let hub = RelayHub::new(100);
        let (a, _ra) = connection("a", "alice", 4);
        hub.register(Arc::clone(&a)).await;
        assert!(hub.on_disconnect(&a.id).await);
        assert!(!hub.on_disconnect(&a.id).await);
    }

    #[tokio::test]
    async fn close_all_cancels_sessions() {
        let hub = RelayHub::new(100);
        let (a, _ra) = connection("a", "alice", 4);
        let (b, _rb) = connection("b", "bob", 4);
        hub.register(Arc::clone(&a)).await;
        hub.register(Arc::clone(&b)).await;
        hub.close_all().await;
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn disconnect_user_closes_only_their_connections() {
        let hub = RelayHub::new(100);
        let (a1, _r1) = connection("a1", "alice", 4);
        let (a2, _r2) = connection("a2", "alice", 4);
        let (b, _rb) = connection("b", "bob", 4);
        for c in [&a1, &a2, &b] {
            hub.register(Arc::clone(c)).await;
        }
        assert_eq!(hub.disconnect_user(&UserId::from("alice")).await, 2);
        assert!(a1.is_closed() && a2.is_closed());
        assert!(!b.is_closed());
        assert_eq!(hub.disconnect_user(&UserId::from("nobody")).await, 0);
    }
}
