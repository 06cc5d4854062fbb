//! Per-connection state shared between the session tasks and the rooms.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use huddle_auth::UserIdentity;
use huddle_core::{ConnectionId, ServerMessage, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One authenticated `WebSocket` client.
pub struct ClientConnection {
    /// Server-assigned handle.
    pub id: ConnectionId,
    identity: UserIdentity,
    /// Outbound FIFO drained by the session's writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When the upgrade completed.
    pub connected_at: Instant,
    /// Last inbound frame of any kind, Pong included.
    last_activity: Mutex<Instant>,
    dropped_messages: AtomicU64,
    /// Cancelled to end the session (eviction, timeout, shutdown).
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a connection bound to `identity` for its whole life.
    pub fn new(
        id: ConnectionId,
        identity: UserIdentity,
        tx: mpsc::Sender<Arc<String>>,
        cancel: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity,
            tx,
            connected_at: now,
            last_activity: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            cancel,
        }
    }

    /// Authenticated identity.
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Authenticated user id.
    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    /// Enqueue a pre-serialized frame without waiting.
    ///
    /// Returns `false` when the queue is full or closed; the drop is counted.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue a server message.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize server message");
                false
            }
        }
    }

    /// Lifetime count of dropped frames.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound frame (or since connect).
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Ask the session to terminate. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether [`close`](Self::close) has been called (or shutdown began).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The session's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user_id", self.user_id())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Connection plus the receiving end of its queue.
    pub(crate) fn connection(
        id: &str,
        user: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::new(
            ConnectionId::from(id),
            UserIdentity::new(user),
            tx,
            CancellationToken::new(),
        );
        (Arc::new(conn), rx)
    }
}
