//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live `WebSocket` connections.
    pub connections: usize,
    /// Non-empty rooms.
    pub rooms: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    rooms: usize,
    shutting_down: bool,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        rooms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        assert_eq!(health_check(Instant::now(), 0, 0, false).status, "ok");
    }

    #[test]
    fn status_while_shutting_down() {
        assert_eq!(
            health_check(Instant::now(), 0, 0, true).status,
            "shutting_down"
        );
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        assert!(health_check(start, 0, 0, false).uptime_secs >= 59);
    }

    #[test]
    fn camel_case_fields() {
        let json = serde_json::to_value(health_check(Instant::now(), 3, 2, false)).unwrap();
        assert_eq!(json["connections"], 3);
        assert_eq!(json["rooms"], 2);
        assert!(json.get("uptimeSecs").is_some());
    }
}
