//! # huddle-client
//!
//! Client side of the Huddle relay.
//!
//! - [`RealtimeClient`]: one authenticated `WebSocket`, reconnect with
//!   exponential backoff and jitter, fire-and-forget [`emit_update`](RealtimeClient::emit_update)
//! - [`Reconciler`]: connection state machine, watched resources, and a
//!   [`LocalView`] that merges live updates and is rebuilt from the CRUD API
//!   after every reconnect
//! - [`CrudApi`]: the authoritative state source, [`HttpCrudApi`] over `reqwest`

#![deny(unsafe_code)]

pub mod backoff;
pub mod crud;
pub mod errors;
pub mod reconciler;
pub mod state;
pub mod transport;
pub mod view;

pub use backoff::ReconnectPolicy;
pub use crud::{CrudApi, HttpCrudApi};
pub use errors::{ApplicationError, ClientError};
pub use reconciler::{FetchFailure, RefetchReport, Reconciler, Resync};
pub use state::{ConnectionState, ConnectionStateMachine};
pub use transport::{ClientConfig, RealtimeClient};
pub use view::{LocalView, MergeOutcome, ResourceSnapshot};
