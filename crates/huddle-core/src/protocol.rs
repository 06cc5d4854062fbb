//! Realtime wire protocol: JSON text frames tagged by `type`.
//!
//! Client → server: `join`, `leave`, `update`, `ping`.
//! Server → client: `connection.established`, `joined`, `left`, `updated`,
//! `pong`, `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::events::{EntityKind, FieldMap, UpdateEvent};
use crate::ids::{ConnectionId, EntityId, UserId};
use crate::resource::ResourceKey;

/// Current UTC time in the wire timestamp format (RFC 3339, millis).
pub fn wire_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// Frame sent by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Start receiving broadcasts for a resource.
    Join {
        /// Room to join.
        resource_id: ResourceKey,
    },
    /// Stop receiving broadcasts for a resource.
    Leave {
        /// Room to leave.
        resource_id: ResourceKey,
    },
    /// Relay a field-level change to the other room members.
    Update {
        /// Room to broadcast into.
        resource_id: ResourceKey,
        /// The change itself.
        event: UpdateEvent,
    },
    /// Application-level keepalive.
    Ping,
}

/// Loosely typed first pass so each failure maps to a precise error code.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum RawClientMessage {
    Join { resource_id: String },
    Leave { resource_id: String },
    Update { resource_id: String, event: Value },
    Ping,
}

impl ClientMessage {
    /// Decode and validate a text frame.
    ///
    /// Unknown shapes yield `Malformed`, bad keys `InvalidResource`, and
    /// bad payloads `InvalidEvent`. A frame that fails here is never relayed.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawClientMessage = serde_json::from_str(text)?;
        match raw {
            RawClientMessage::Join { resource_id } => Ok(Self::Join {
                resource_id: ResourceKey::parse(&resource_id)?,
            }),
            RawClientMessage::Leave { resource_id } => Ok(Self::Leave {
                resource_id: ResourceKey::parse(&resource_id)?,
            }),
            RawClientMessage::Update { resource_id, event } => {
                let resource_id = ResourceKey::parse(&resource_id)?;
                let event: UpdateEvent = serde_json::from_value(event)
                    .map_err(|e| ProtocolError::InvalidEvent(e.to_string()))?;
                event.validate()?;
                Ok(Self::Update { resource_id, event })
            }
            RawClientMessage::Ping => Ok(Self::Ping),
        }
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Identity attached to a freshly established connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Server-assigned connection handle.
    pub connection_id: ConnectionId,
    /// Authenticated user.
    pub user_id: UserId,
}

/// An update as delivered to the other members of a room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedUpdate {
    /// Room the update was broadcast into.
    pub resource_id: ResourceKey,
    /// Entity that changed.
    pub entity_id: EntityId,
    /// Kind of that entity.
    pub entity_kind: EntityKind,
    /// Overwritten fields.
    pub changed_fields: FieldMap,
    /// User whose connection emitted the change.
    pub emitted_by: UserId,
    /// Relay timestamp (RFC 3339).
    pub timestamp: String,
}

impl RelayedUpdate {
    /// Annotate an event with its room and emitter.
    pub fn new(resource_id: ResourceKey, event: &UpdateEvent, emitted_by: UserId) -> Self {
        Self {
            resource_id,
            entity_id: event.entity_id().clone(),
            entity_kind: event.entity_kind(),
            changed_fields: event.changed_fields().clone(),
            emitted_by,
            timestamp: wire_timestamp(),
        }
    }

    /// Rebuild the typed event.
    #[must_use]
    pub fn to_event(&self) -> UpdateEvent {
        UpdateEvent::for_entity(
            self.entity_kind,
            self.entity_id.clone(),
            self.changed_fields.clone(),
        )
    }
}

/// Frame sent by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame after a successful authenticated upgrade.
    #[serde(rename = "connection.established")]
    ConnectionEstablished {
        /// Connection identity.
        data: ConnectionInfo,
        /// Server time.
        timestamp: String,
    },
    /// Acknowledges a `join`.
    #[serde(rename = "joined")]
    Joined {
        /// Room joined.
        resource_id: ResourceKey,
        /// Member count after the join, including the caller.
        members: usize,
    },
    /// Acknowledges a `leave` (sent even when it was a no-op).
    #[serde(rename = "left")]
    Left {
        /// Room left.
        resource_id: ResourceKey,
    },
    /// A peer's change.
    #[serde(rename = "updated")]
    Updated(RelayedUpdate),
    /// Reply to `ping`.
    #[serde(rename = "pong")]
    Pong,
    /// A rejected frame.
    #[serde(rename = "error")]
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable detail.
        message: String,
    },
}

impl ServerMessage {
    /// Build the `connection.established` greeting.
    pub fn established(connection_id: ConnectionId, user_id: UserId) -> Self {
        Self::ConnectionEstablished {
            data: ConnectionInfo {
                connection_id,
                user_id,
            },
            timestamp: wire_timestamp(),
        }
    }

    /// Build an error reply.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Parse a server frame (client side).
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&ProtocolError> for ServerMessage {
    fn from(err: &ProtocolError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}
