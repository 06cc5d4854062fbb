//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may specify any subset of fields; missing ones keep their defaults.

mod auth;
mod client;
mod server;

pub use auth::*;
pub use client::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "auth": { "mode": "jwt", "jwtSecret": "..." },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Relay server network and runtime limits.
    pub server: ServerSettings,
    /// Bearer-token verification.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Realtime client behavior.
    pub client: ClientSettings,
}

impl HuddleSettings {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if !(1..=MAX_CONNECTIONS_LIMIT).contains(&server.max_connections) {
            return Err(SettingsError::InvalidValue(format!(
                "server.maxConnections ({}) must be within 1..={MAX_CONNECTIONS_LIMIT}",
                server.max_connections
            )));
        }
        if server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be positive".into(),
            ));
        }
        if server.heartbeat_timeout_ms < server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutMs ({}) is shorter than heartbeatIntervalMs ({})",
                server.heartbeat_timeout_ms, server.heartbeat_interval_ms
            )));
        }
        if server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be positive".into(),
            ));
        }
        if self.auth.mode == AuthMode::Static && self.auth.static_tokens.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.mode is 'static' but auth.staticTokens is empty".into(),
            ));
        }
        if self.client.reconnect_max_delay_ms < self.client.reconnect_base_delay_ms {
            return Err(SettingsError::InvalidValue(
                "client.reconnectMaxDelayMs is shorter than reconnectBaseDelayMs".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.client.jitter_factor) {
            return Err(SettingsError::InvalidValue(
                "client.jitterFactor must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: HuddleSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.auth.mode, AuthMode::Jwt);
    }

    #[test]
    fn timeout_shorter_than_interval_is_rejected() {
        let mut settings = HuddleSettings::default();
        settings.server.heartbeat_interval_ms = 10_000;
        settings.server.heartbeat_timeout_ms = 5_000;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeatTimeoutMs"));
    }

    #[test]
    fn static_mode_requires_tokens() {
        let mut settings = HuddleSettings::default();
        settings.auth.mode = AuthMode::Static;
        assert!(settings.validate().is_err());
        settings.auth.static_tokens.push(StaticToken {
            token: "dev".into(),
            user_id: "alice".into(),
            display_name: None,
        });
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn jitter_out_of_range_is_rejected() {
        let mut settings = HuddleSettings::default();
        settings.client.jitter_factor = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn max_connections_bounds() {
        let mut settings = HuddleSettings::default();
        settings.server.max_connections = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("maxConnections"));

        settings.server.max_connections = usize::MAX;
        assert!(settings.validate().is_err());

        settings.server.max_connections = MAX_CONNECTIONS_LIMIT;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_queue_is_rejected() {
        let mut settings = HuddleSettings::default();
        settings.server.send_queue_capacity = 0;
        assert!(settings.validate().is_err());
    }
}
