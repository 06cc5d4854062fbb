//! Server configuration.

use std::time::Duration;

use huddle_settings::ServerSettings;

/// Runtime configuration for [`HuddleServer`](crate::HuddleServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// Maximum concurrent `WebSocket` connections.
    pub max_connections: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Close a connection that has been silent this long.
    pub heartbeat_timeout: Duration,
    /// Largest inbound frame answered with anything but `FRAME_TOO_LARGE`.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Lifetime drops after which a slow connection is evicted.
    pub max_total_drops: u64,
}

impl ServerConfig {
    /// Build from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
            max_message_size: settings.max_message_size,
            send_queue_capacity: settings.send_queue_capacity,
            max_total_drops: settings.max_total_drops,
        }
    }

    /// Transport-level frame cap handed to axum. Frames between
    /// `max_message_size` and this get an error reply, larger ones close the
    /// socket.
    pub fn transport_frame_limit(&self) -> usize {
        self.max_message_size.saturating_mul(4)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            max_message_size: 256 * 1024,
            send_queue_capacity: 256,
            max_total_drops: 100,
        }
    }
}
