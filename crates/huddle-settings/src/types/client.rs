//! Realtime client settings.

use serde::{Deserialize, Serialize};

/// Reconnect and CRUD endpoint settings for `huddle-client`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Relay WebSocket URL.
    pub relay_url: String,
    /// Base URL of the authoritative CRUD API.
    pub crud_base_url: String,
    /// First reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_delay_ms: u64,
    /// Jitter applied to each delay (0.0–1.0).
    pub jitter_factor: f64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8787/ws".to_string(),
            crud_base_url: "http://127.0.0.1:3000".to_string(),
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}
