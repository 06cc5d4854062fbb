//! Update fan-out to room members.

use std::sync::Arc;

use huddle_core::{RelayedUpdate, ResourceKey, ServerMessage, UpdateEvent};
use metrics::counter;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::rooms::RoomRegistry;
use crate::metrics::{RELAY_BROADCASTS_TOTAL, RELAY_DELIVERIES_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// Result of one [`Broadcaster::broadcast`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Members the frame was enqueued for.
    pub recipients: usize,
    /// Members whose queue was full or closed.
    pub dropped: usize,
    /// Members evicted for exceeding the drop budget.
    pub evicted: usize,
}

/// Serializes each update once and enqueues it for every other member.
///
/// Sends never wait: a full recipient queue drops the frame for that
/// recipient only. A recipient that reaches `max_total_drops` is evicted.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    max_total_drops: u64,
}

impl Broadcaster {
    /// Broadcaster evicting after `max_total_drops` lifetime drops.
    pub fn new(max_total_drops: u64) -> Self {
        Self { max_total_drops }
    }

    /// Relay `event` to every member of `key` except `origin`.
    ///
    /// An empty or missing room is a no-op.
    pub async fn broadcast(
        &self,
        rooms: &RoomRegistry,
        key: &ResourceKey,
        event: &UpdateEvent,
        origin: &ClientConnection,
    ) -> BroadcastOutcome {
        let recipients = rooms.recipients(key, Some(&origin.id)).await;
        if recipients.is_empty() {
            debug!(resource = %key, conn_id = %origin.id, "no other members, nothing to relay");
            return BroadcastOutcome::default();
        }

        let message = ServerMessage::Updated(RelayedUpdate::new(
            key.clone(),
            event,
            origin.user_id().clone(),
        ));
        let frame = match message.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(resource = %key, error = %e, "failed to serialize update");
                return BroadcastOutcome::default();
            }
        };

        counter!(RELAY_BROADCASTS_TOTAL).increment(1);
        let mut outcome = BroadcastOutcome::default();
        let mut slow = Vec::new();
        for conn in &recipients {
            if conn.send(Arc::clone(&frame)) {
                outcome.recipients += 1;
                continue;
            }
            outcome.dropped += 1;
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            let drops = conn.drop_count();
            if drops >= self.max_total_drops {
                warn!(conn_id = %conn.id, resource = %key, drops, "evicting slow connection");
                slow.push(Arc::clone(conn));
            } else {
                debug!(conn_id = %conn.id, resource = %key, total_drops = drops, "recipient queue full, update dropped");
            }
        }
        counter!(RELAY_DELIVERIES_TOTAL).increment(outcome.recipients as u64);

        for conn in slow {
            let _ = rooms.leave_all(&conn.id).await;
            conn.close();
            outcome.evicted += 1;
        }

        debug!(
            resource = %key,
            entity_id = %event.entity_id(),
            recipients = outcome.recipients,
            dropped = outcome.dropped,
            "update relayed"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::connection;
    use huddle_core::FieldMap;
    use serde_json::{Value, json};

    fn page42() -> ResourceKey {
        ResourceKey::page("42").unwrap()
    }

    fn block_event(content: &str) -> UpdateEvent {
        let mut fields = FieldMap::new();
        let _ = fields.insert("content".into(), json!(content));
        UpdateEvent::BlockUpdated {
            block_id: "block:7".into(),
            changed_fields: fields,
        }
    }

    #[tokio::test]
    async fn delivers_to_others_not_origin() {
        let rooms = RoomRegistry::new();
        let (a, mut ra) = connection("a", "alice", 8);
        let (b, mut rb) = connection("b", "bob", 8);
        let _ = rooms.join(&a, page42()).await;
        let _ = rooms.join(&b, page42()).await;

        let outcome = Broadcaster::new(100)
            .broadcast(&rooms, &page42(), &block_event("Hello"), &a)
            .await;
        assert_eq!(outcome.recipients, 1);
        assert_eq!(outcome.dropped, 0);

        let frame: Value = serde_json::from_str(&rb.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "updated");
        assert_eq!(frame["resourceId"], "page:42");
        assert_eq!(frame["entityId"], "block:7");
        assert_eq!(frame["changedFields"]["content"], "Hello");
        assert_eq!(frame["emittedBy"], "alice");
        assert!(ra.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_room_is_noop() {
        let rooms = RoomRegistry::new();
        let (a, _ra) = connection("a", "alice", 8);
        let outcome = Broadcaster::new(100)
            .broadcast(&rooms, &page42(), &block_event("x"), &a)
            .await;
        assert_eq!(outcome, BroadcastOutcome::default());
    }

    #[tokio::test]
    async fn sender_not_member_still_relays() {
        let rooms = RoomRegistry::new();
        let (a, _ra) = connection("a", "alice", 8);
        let (b, mut rb) = connection("b", "bob", 8);
        let _ = rooms.join(&b, page42()).await;
        let outcome = Broadcaster::new(100)
            .broadcast(&rooms, &page42(), &block_event("x"), &a)
            .await;
        assert_eq!(outcome.recipients, 1);
        assert!(rb.try_recv().is_ok());
    }

    #[tokio::test]
    async fn order_preserved_per_recipient() {
        let rooms = RoomRegistry::new();
        let (a, _ra) = connection("a", "alice", 8);
        let (b, mut rb) = connection("b", "bob", 8);
        let _ = rooms.join(&a, page42()).await;
        let _ = rooms.join(&b, page42()).await;

        let broadcaster = Broadcaster::new(100);
        for text in ["one", "two", "three"] {
            let _ = broadcaster
                .broadcast(&rooms, &page42(), &block_event(text), &a)
                .await;
        }
        for expected in ["one", "two", "three"] {
            let frame: Value = serde_json::from_str(&rb.try_recv().unwrap()).unwrap();
            assert_eq!(frame["changedFields"]["content"], expected);
        }
    }

    #[tokio::test]
    async fn full_queue_drops_for_that_recipient_only() {
        let rooms = RoomRegistry::new();
        let (a, _ra) = connection("a", "alice", 8);
        let (slow, _rs) = connection("s", "slow", 1);
        let (fast, mut rf) = connection("f", "fast", 8);
        for conn in [&a, &slow, &fast] {
            let _ = rooms.join(conn, page42()).await;
        }

        let broadcaster = Broadcaster::new(100);
        let first = broadcaster
            .broadcast(&rooms, &page42(), &block_event("1"), &a)
            .await;
        assert_eq!(first.recipients, 2);
        let second = broadcaster
            .broadcast(&rooms, &page42(), &block_event("2"), &a)
            .await;
        assert_eq!(second.recipients, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(second.evicted, 0);

        assert!(rf.try_recv().is_ok());
        assert!(rf.try_recv().is_ok());
        assert_eq!(slow.drop_count(), 1);
    }

    #[tokio::test]
    async fn slow_recipient_evicted_after_budget() {
        let (logs, _guard) = huddle_logging::capture_logs();
        let rooms = RoomRegistry::new();
        let (a, _ra) = connection("a", "alice", 8);
        let (slow, _rs) = connection("s", "slow", 1);
        let _ = rooms.join(&a, page42()).await;
        let _ = rooms.join(&slow, page42()).await;
        let _ = rooms.join(&slow, ResourceKey::task("9").unwrap()).await;

        let broadcaster = Broadcaster::new(2);
        let mut evicted = 0;
        for i in 0..3 {
            let outcome = broadcaster
                .broadcast(&rooms, &page42(), &block_event(&i.to_string()), &a)
                .await;
            evicted += outcome.evicted;
        }
        assert_eq!(evicted, 1);
        assert!(slow.is_closed());
        assert!(rooms.rooms_of(&slow.id).await.is_empty());
        assert!(!rooms.contains_room(&ResourceKey::task("9").unwrap()).await);
        let warning = logs
            .find(tracing::Level::WARN, "evicting slow connection")
            .unwrap();
        assert_eq!(warning.field("conn_id"), Some(slow.id.to_string().as_str()));
        assert_eq!(warning.field("drops"), Some("2"));
    }
}
