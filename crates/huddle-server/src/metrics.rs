//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before any metric is recorded. The returned handle
/// renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a private, non-global recorder (tests, embedding).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Rejected upgrades (counter, label: code).
pub const WS_AUTH_FAILURES_TOTAL: &str = "ws_auth_failures_total";
/// Updates dropped on a full recipient queue (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Updates fanned out (counter).
pub const RELAY_BROADCASTS_TOTAL: &str = "relay_broadcasts_total";
/// Per-recipient deliveries enqueued (counter).
pub const RELAY_DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Inbound frames rejected at the boundary (counter, label: code).
pub const RELAY_REJECTED_FRAMES_TOTAL: &str = "relay_rejected_frames_total";
/// Non-empty rooms (gauge).
pub const RELAY_ROOMS_ACTIVE: &str = "relay_rooms_active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_renders() {
        let handle = detached_handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_AUTH_FAILURES_TOTAL,
            WS_BROADCAST_DROPS_TOTAL,
            RELAY_BROADCASTS_TOTAL,
            RELAY_DELIVERIES_TOTAL,
            RELAY_REJECTED_FRAMES_TOTAL,
            RELAY_ROOMS_ACTIVE,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
