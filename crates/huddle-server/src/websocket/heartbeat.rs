//! Liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Nothing was received within the timeout window.
    TimedOut,
    /// The session ended for another reason.
    Cancelled,
}

/// Watch `connection` until it goes silent for `timeout` or `cancel` fires.
///
/// Checked once per `interval`. Any inbound frame (Pong included) resets the
/// idle clock via [`ClientConnection::mark_alive`].
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check = time::interval(interval);
    check.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // First tick completes immediately.
    let _ = check.tick().await;

    loop {
        tokio::select! {
            _ = check.tick() => {
                if connection.idle_for() >= timeout {
                    return HeartbeatResult::TimedOut;
                }
            }
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::connection;

    #[tokio::test(start_paused = true)]
    async fn cancelled() {
        let (conn, _rx) = connection("hb", "u", 4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            conn,
            Duration::from_secs(30),
            Duration::from_secs(90),
            cancel.clone(),
        ));
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_times_out() {
        let (conn, _rx) = connection("hb", "u", 4);
        let result = run_heartbeat(
            conn,
            Duration::from_secs(1),
            Duration::from_secs(3),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn active_connection_stays_up() {
        let (conn, _rx) = connection("hb", "u", 4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            Arc::clone(&conn),
            Duration::from_secs(1),
            Duration::from_secs(3),
            cancel.clone(),
        ));

        for _ in 0..10 {
            time::sleep(Duration::from_millis(900)).await;
            conn.mark_alive();
        }
        assert!(!handle.is_finished());
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }
}
