//! `WebSocket` connections, rooms, fan-out, heartbeat and frame dispatch.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod hub;
pub mod rooms;
pub mod session;
