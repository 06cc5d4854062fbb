//! Inbound frame dispatch: parse, validate, apply to the hub.

use std::sync::Arc;

use huddle_core::{ClientMessage, ProtocolError, ServerMessage};
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::connection::ClientConnection;
use super::hub::RelayHub;
use crate::metrics::RELAY_REJECTED_FRAMES_TOTAL;

/// What a frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleResult {
    /// Frame type (`"join"`, `"update"`, ...), or `"invalid"`.
    pub kind: &'static str,
    /// Reply for the sender, if any. Updates get none on success.
    pub reply: Option<ServerMessage>,
}

impl HandleResult {
    fn reply(kind: &'static str, message: ServerMessage) -> Self {
        Self {
            kind,
            reply: Some(message),
        }
    }

    fn rejected(err: &ProtocolError) -> Self {
        counter!(RELAY_REJECTED_FRAMES_TOTAL, "code" => err.code()).increment(1);
        Self::reply("invalid", ServerMessage::from(err))
    }
}

/// Handle one inbound text frame from `conn`.
///
/// Frames over `max_message_size` and frames that fail validation are
/// answered with an `error` reply and never reach the broadcaster.
#[instrument(skip_all, fields(conn_id = %conn.id, kind))]
pub async fn handle_message(
    text: &str,
    conn: &Arc<ClientConnection>,
    hub: &RelayHub,
    max_message_size: usize,
) -> HandleResult {
    if text.len() > max_message_size {
        let err = ProtocolError::FrameTooLarge {
            size: text.len(),
            limit: max_message_size,
        };
        warn!(size = text.len(), limit = max_message_size, "frame too large");
        return HandleResult::rejected(&err);
    }

    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(code = err.code(), error = %err, "rejecting frame");
            return HandleResult::rejected(&err);
        }
    };

    match message {
        ClientMessage::Join { resource_id } => {
            let _ = tracing::Span::current().record("kind", "join");
            let members = hub.join(conn, resource_id.clone()).await;
            HandleResult::reply(
                "join",
                ServerMessage::Joined {
                    resource_id,
                    members,
                },
            )
        }
        ClientMessage::Leave { resource_id } => {
            let _ = tracing::Span::current().record("kind", "leave");
            let changed = hub.leave(conn, &resource_id).await;
            debug!(resource = %resource_id, changed, "left");
            HandleResult::reply("leave", ServerMessage::Left { resource_id })
        }
        ClientMessage::Update { resource_id, event } => {
            let _ = tracing::Span::current().record("kind", "update");
            let _ = hub.broadcast(&resource_id, &event, conn).await;
            HandleResult {
                kind: "update",
                reply: None,
            }
        }
        ClientMessage::Ping => HandleResult::reply("ping", ServerMessage::Pong),
    }
}
