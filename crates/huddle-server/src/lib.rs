//! # huddle-server
//!
//! Axum `WebSocket` relay for field-level update events.
//!
//! - `/ws`: authenticated upgrade, then `join` / `leave` / `update` / `ping`
//!   frames over one connection
//! - Room registry keyed by resource (`page:42`), created on first join and
//!   dropped when empty
//! - Fan-out of each update to every other room member, without ack or retry
//! - Heartbeat liveness, slow-client eviction, graceful shutdown
//! - `/health` and Prometheus `/metrics`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::HuddleServer;
pub use websocket::broadcast::BroadcastOutcome;
pub use websocket::hub::RelayHub;
