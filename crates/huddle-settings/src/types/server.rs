//! Server and logging settings.

use serde::{Deserialize, Serialize};

/// Upper bound for `maxConnections`.
pub const MAX_CONNECTIONS_LIMIT: usize = 1_000_000;

/// Relay server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` auto-assigns).
    pub port: u16,
    /// Maximum concurrent realtime connections.
    pub max_connections: usize,
    /// Interval between server Ping frames in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a connection silent for this long, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Largest accepted inbound frame in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Dropped deliveries after which a slow connection is evicted.
    pub max_total_drops: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_connections: 1024,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 256 * 1024,
            send_queue_capacity: 256,
            max_total_drops: 100,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8787);
        assert_eq!(s.heartbeat_interval_ms, 30_000);
        assert_eq!(s.heartbeat_timeout_ms, 90_000);
        assert_eq!(s.send_queue_capacity, 256);
    }

    #[test]
    fn server_camel_case_keys() {
        let json = serde_json::to_value(ServerSettings::default()).unwrap();
        assert!(json.get("maxConnections").is_some());
        assert!(json.get("heartbeatIntervalMs").is_some());
        assert!(json.get("sendQueueCapacity").is_some());
    }

    #[test]
    fn log_format_lowercase() {
        let fmt: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(fmt, LogFormat::Json);
        assert!(serde_json::from_str::<LogFormat>("\"pretty\"").is_err());
    }
}
