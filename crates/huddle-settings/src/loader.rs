//! Settings loading: defaults, then the JSON file, then `HUDDLE_*` env vars.
//!
//! Deep merge rules:
//! - Objects merge recursively (source wins per key)
//! - Arrays and primitives are replaced by the source
//! - `null` in the source leaves the target untouched

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{AuthMode, HuddleSettings, LogFormat, MAX_CONNECTIONS_LIMIT};

/// Default settings file location (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load from [`settings_path`] with env overrides applied.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load from `path` with env overrides applied, then validate.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: HuddleSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursively merge `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUDDLE_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut HuddleSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored, keeping the file/default value.
pub fn apply_overrides_from<F>(settings: &mut HuddleSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // server
    if let Some(v) = env.string("HUDDLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("HUDDLE_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("HUDDLE_MAX_CONNECTIONS", 1, MAX_CONNECTIONS_LIMIT) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.u64("HUDDLE_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64("HUDDLE_HEARTBEAT_TIMEOUT_MS", 100, 3_600_000) {
        settings.server.heartbeat_timeout_ms = v;
    }
    if let Some(v) = env.usize("HUDDLE_MAX_MESSAGE_SIZE", 1024, 64 * 1024 * 1024) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.usize("HUDDLE_SEND_QUEUE_CAPACITY", 1, 1_000_000) {
        settings.server.send_queue_capacity = v;
    }

    // auth
    if let Some(v) = env.string("HUDDLE_AUTH_MODE") {
        match v.to_lowercase().as_str() {
            "jwt" => settings.auth.mode = AuthMode::Jwt,
            "static" => settings.auth.mode = AuthMode::Static,
            _ => warn!(key = "HUDDLE_AUTH_MODE", value = %v, "unknown auth mode, ignoring"),
        }
    }
    if let Some(v) = env.string("HUDDLE_JWT_SECRET") {
        settings.auth.jwt_secret = v;
    }
    if let Some(v) = env.string("HUDDLE_JWT_ISSUER") {
        settings.auth.issuer = Some(v);
    }
    if let Some(v) = env.string("HUDDLE_JWT_AUDIENCE") {
        settings.auth.audience = Some(v);
    }

    // logging
    if let Some(v) = env.string("HUDDLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("HUDDLE_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "HUDDLE_LOG_FORMAT", value = %v, "unknown log format, ignoring"),
        }
    }

    // client
    if let Some(v) = env.string("HUDDLE_RELAY_URL") {
        settings.client.relay_url = v;
    }
    if let Some(v) = env.string("HUDDLE_CRUD_BASE_URL") {
        settings.client.crud_base_url = v;
    }
    if let Some(v) = env.u64("HUDDLE_RECONNECT_BASE_DELAY_MS", 1, 600_000) {
        settings.client.reconnect_base_delay_ms = v;
    }
    if let Some(v) = env.u64("HUDDLE_RECONNECT_MAX_DELAY_MS", 1, 3_600_000) {
        settings.client.reconnect_max_delay_ms = v;
    }
}

/// Parse `compact` / `json` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Parse a `u16` within `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` within `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.string(name)?;
        let parsed = parse_u16_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        parsed
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        parsed
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.string(name)?;
        let parsed = parse_usize_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use serde_json::json;

    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> HuddleSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = HuddleSettings::default();
        apply_overrides_from(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_objects() {
        let target = json!({"server": {"host": "127.0.0.1", "port": 8787}});
        let source = json!({"server": {"port": 9000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"server": {"host": "127.0.0.1", "port": 9000}}));
    }

    #[test]
    fn merge_skips_nulls() {
        let target = json!({"logging": {"level": "info"}});
        let source = json!({"logging": {"level": null}});
        assert_eq!(deep_merge(target, source), json!({"logging": {"level": "info"}}));
    }

    #[test]
    fn merge_replaces_arrays() {
        let target = json!({"auth": {"revokedJtis": ["a", "b"]}});
        let source = json!({"auth": {"revokedJtis": ["c"]}});
        assert_eq!(
            deep_merge(target, source),
            json!({"auth": {"revokedJtis": ["c"]}})
        );
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.server.port, HuddleSettings::default().server.port);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"maxConnections": 10}}, "logging": {{"format": "json"}}}}"#
        )
        .unwrap();
        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.server.max_connections, 10);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.server.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(load_settings_from_path(file.path()).is_err());
    }

    #[test]
    fn inconsistent_file_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"heartbeatIntervalMs": 5000, "heartbeatTimeoutMs": 1000}}}}"#
        )
        .unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("heartbeatTimeoutMs"));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_server_fields() {
        let settings = overrides(&[
            ("HUDDLE_HOST", "0.0.0.0"),
            ("HUDDLE_PORT", "9100"),
            ("HUDDLE_MAX_CONNECTIONS", "5"),
            ("HUDDLE_HEARTBEAT_INTERVAL_MS", "1000"),
        ]);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.max_connections, 5);
        assert_eq!(settings.server.heartbeat_interval_ms, 1000);
    }

    #[test]
    fn env_invalid_values_are_ignored() {
        let settings = overrides(&[
            ("HUDDLE_PORT", "99999"),
            ("HUDDLE_MAX_CONNECTIONS", "lots"),
            ("HUDDLE_LOG_FORMAT", "pretty"),
            ("HUDDLE_AUTH_MODE", "oauth"),
        ]);
        let defaults = HuddleSettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.server.max_connections, defaults.server.max_connections);
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert_eq!(settings.auth.mode, AuthMode::Jwt);
    }

    #[test]
    fn env_empty_string_is_ignored() {
        let settings = overrides(&[("HUDDLE_HOST", "")]);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn env_auth_and_logging() {
        let settings = overrides(&[
            ("HUDDLE_AUTH_MODE", "STATIC"),
            ("HUDDLE_JWT_SECRET", "s3cret"),
            ("HUDDLE_JWT_ISSUER", "huddle-auth"),
            ("HUDDLE_LOG_LEVEL", "debug"),
            ("HUDDLE_LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(settings.auth.mode, AuthMode::Static);
        assert_eq!(settings.auth.jwt_secret, "s3cret");
        assert_eq!(settings.auth.issuer.as_deref(), Some("huddle-auth"));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_client_fields() {
        let settings = overrides(&[
            ("HUDDLE_CRUD_BASE_URL", "https://api.example.test"),
            ("HUDDLE_RECONNECT_BASE_DELAY_MS", "250"),
        ]);
        assert_eq!(settings.client.crud_base_url, "https://api.example.test");
        assert_eq!(settings.client.reconnect_base_delay_ms, 250);
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range(" 42 ", 1, 100), Some(42));
        assert_eq!(parse_u64_range("101", 1, 100), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }

    #[test]
    fn parse_log_formats() {
        assert_eq!(parse_log_format("compact"), Some(LogFormat::Compact));
        assert_eq!(parse_log_format("Json"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("text"), None);
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".huddle/settings.json"));
    }
}
