//! One client's lifecycle from upgrade to disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use huddle_auth::UserIdentity;
use huddle_core::{ConnectionId, ServerMessage};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::handler::handle_message;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::hub::RelayHub;
use crate::config::ServerConfig;

/// How long the writer gets to send its Close frame after the session ends.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Run a session for an authenticated socket.
///
/// 1. Enqueues `connection.established`, then registers with the hub
/// 2. Writer task drains the outbound queue and sends Ping frames
/// 3. Heartbeat task closes the session after `heartbeat_timeout` of silence
/// 4. Reader loop dispatches frames sequentially until close, error,
///    eviction or shutdown
/// 5. Releases every membership on the way out
#[instrument(skip_all, fields(conn_id, user_id = %identity.user_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    identity: UserIdentity,
    hub: Arc<RelayHub>,
    config: Arc<ServerConfig>,
    cancel: CancellationToken,
) {
    let conn_id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", conn_id.as_str());

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id, identity, send_tx, cancel));

    let greeting = ServerMessage::established(connection.id.clone(), connection.user_id().clone());
    let _ = connection.send_message(&greeting);
    hub.register(Arc::clone(&connection)).await;
    info!("client connected");

    let writer_cancel = connection.cancel_token().clone();
    let ping_every = config.heartbeat_interval;
    let mut writer = tokio::spawn(async move {
        let mut ping = time::interval(ping_every);
        let _ = ping.tick().await;
        loop {
            tokio::select! {
                biased;
                () = writer_cancel.cancelled() => break,
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        writer_cancel.cancel();
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        writer_cancel.cancel();
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        let _ = ws_tx.close().await;
    });

    let heartbeat_conn = Arc::clone(&connection);
    let heartbeat_cancel = connection.cancel_token().clone();
    let (interval, timeout) = (config.heartbeat_interval, config.heartbeat_timeout);
    let heartbeat = tokio::spawn(async move {
        let result = run_heartbeat(
            Arc::clone(&heartbeat_conn),
            interval,
            timeout,
            heartbeat_cancel,
        )
        .await;
        if result == HeartbeatResult::TimedOut {
            warn!(conn_id = %heartbeat_conn.id, ?timeout, "client unresponsive, disconnecting");
            heartbeat_conn.close();
        }
    });

    loop {
        let frame = tokio::select! {
            () = connection.cancel_token().cancelled() => break,
            frame = ws_rx.next() => frame,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let result = handle_message(&text, &connection, &hub, config.max_message_size).await;
        if let Some(reply) = result.reply {
            if !connection.send_message(&reply) {
                debug!(kind = result.kind, "reply dropped, outbound queue full or closed");
            }
        }
    }

    connection.close();
    let _ = hub.on_disconnect(&connection.id).await;
    if time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    heartbeat.abort();
    info!(dropped = connection.drop_count(), "client disconnected");
}
