//! # huddle-core
//!
//! Foundation types shared by the Huddle relay server and its clients.
//!
//! - **Branded IDs**: `ConnectionId`, `UserId`, `EntityId` as newtypes for type safety
//! - **Resource keys**: [`ResourceKey`] (`page:42`, `task:7`) naming a relay room
//! - **Update events**: [`UpdateEvent`] tagged union of field-level mutations
//! - **Wire protocol**: [`ClientMessage`] / [`ServerMessage`] frames
//! - **Errors**: [`ProtocolError`] with stable machine codes

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod protocol;
pub mod resource;

pub use errors::ProtocolError;
pub use events::{EntityKind, FieldMap, UpdateEvent};
pub use ids::{ConnectionId, EntityId, UserId};
pub use protocol::{ClientMessage, ConnectionInfo, RelayedUpdate, ServerMessage};
pub use resource::{ResourceKey, ResourceKind};
