//! `WebSocket` transport with reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, RelayedUpdate, ResourceKey, ServerMessage, UpdateEvent};
use huddle_settings::ClientSettings;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::ReconnectPolicy;
use crate::crud::CrudApi;
use crate::errors::ClientError;
use crate::reconciler::{FetchFailure, Reconciler};
use crate::state::ConnectionState;
use crate::view::{LocalView, MergeOutcome};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Outbound frames queued per session. Overflow drops the frame.
const OUTBOUND_CAPACITY: usize = 256;
/// How long the relay gets to send `connection.established`.
const GREETING_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay `WebSocket` URL.
    pub relay_url: String,
    /// Bearer token presented on the handshake.
    pub token: String,
    /// Delay between attempts.
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Build from the `client` settings section.
    pub fn from_settings(settings: &ClientSettings, token: impl Into<String>) -> Self {
        Self {
            relay_url: settings.relay_url.clone(),
            token: token.into(),
            reconnect: ReconnectPolicy::from_settings(settings),
        }
    }
}

/// Realtime client: one relay connection feeding a [`Reconciler`].
///
/// Share it behind an `Arc`, spawn [`run`](Self::run), and call
/// [`watch`](Self::watch) / [`emit_update`](Self::emit_update) from anywhere.
pub struct RealtimeClient {
    config: ClientConfig,
    reconciler: Mutex<Reconciler>,
    outbound: parking_lot::Mutex<Option<mpsc::Sender<String>>>,
    state_tx: watch::Sender<ConnectionState>,
    updates_tx: broadcast::Sender<RelayedUpdate>,
    failures_tx: broadcast::Sender<FetchFailure>,
    cancel: CancellationToken,
}

impl RealtimeClient {
    /// Disconnected client. Nothing happens until [`run`](Self::run).
    pub fn new(config: ClientConfig, crud: Arc<dyn CrudApi>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (updates_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
        let (failures_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            config,
            reconciler: Mutex::new(Reconciler::new(crud)),
            outbound: parking_lot::Mutex::new(None),
            state_tx,
            updates_tx,
            failures_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Receiver of peer updates that were merged into the view.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RelayedUpdate> {
        self.updates_tx.subscribe()
    }

    /// Receiver of resources that could not be re-fetched after a reconnect.
    /// The session stays up; the affected copy is stale until the next fetch.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<FetchFailure> {
        self.failures_tx.subscribe()
    }

    /// Token that stops [`run`](Self::run).
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Read the local view.
    pub async fn with_view<R>(&self, f: impl FnOnce(&LocalView) -> R) -> R {
        f(self.reconciler.lock().await.view())
    }

    /// Start viewing `key`: join its room if connected, then load its snapshot.
    pub async fn watch(&self, key: ResourceKey) -> Result<(), ClientError> {
        let mut reconciler = self.reconciler.lock().await;
        if reconciler.watch(key.clone()) {
            let _ = self.send(&ClientMessage::Join {
                resource_id: key.clone(),
            })?;
        }
        reconciler.refresh(&key).await
    }

    /// Stop viewing `key` and leave its room.
    pub async fn unwatch(&self, key: &ResourceKey) -> Result<(), ClientError> {
        if self.reconciler.lock().await.unwatch(key) {
            let _ = self.send(&ClientMessage::Leave {
                resource_id: key.clone(),
            })?;
        }
        Ok(())
    }

    /// Relay a change to the other members of `resource_id`'s room.
    ///
    /// Fire-and-forget: returns `Ok(false)` when not connected or the
    /// outbound queue is full. Invalid events are rejected locally.
    pub fn emit_update(
        &self,
        resource_id: ResourceKey,
        event: UpdateEvent,
    ) -> Result<bool, ClientError> {
        event.validate()?;
        self.send(&ClientMessage::Update { resource_id, event })
    }

    fn send(&self, message: &ClientMessage) -> Result<bool, ClientError> {
        let text = message.to_json()?;
        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            debug!("not connected, frame dropped");
            return Ok(false);
        };
        Ok(tx.try_send(text).is_ok())
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send_replace(state);
    }

    /// Connect and stay connected until cancelled or refused.
    ///
    /// Transport failures are retried with backoff. A rejected token ends
    /// the loop with [`ClientError::Auth`].
    pub async fn run(&self) -> Result<(), ClientError> {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            self.reconciler.lock().await.begin_connecting()?;
            self.set_state(ConnectionState::Connecting);

            let outcome = match self.connect().await {
                Ok(ws) => {
                    attempt = 0;
                    self.run_session(ws).await
                }
                Err(e) => Err(e),
            };

            *self.outbound.lock() = None;
            self.reconciler.lock().await.on_disconnected()?;
            self.set_state(ConnectionState::Disconnected);

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, attempt, "relay connection lost");
                }
                Err(e) => return Err(e),
            }

            let delay = self.config.reconnect.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!(?delay, attempt, "reconnecting");
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, ClientError> {
        let mut request = self
            .config
            .relay_url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Transport(format!("invalid relay URL: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.token))
            .map_err(|_| ClientError::Auth("token is not a valid header value".into()))?;
        let _ = request.headers_mut().insert(AUTHORIZATION, bearer);

        match connect_async(request).await {
            Ok((ws, _)) => Ok(ws),
            Err(WsError::Http(resp))
                if resp.status() == StatusCode::UNAUTHORIZED
                    || resp.status() == StatusCode::FORBIDDEN =>
            {
                Err(ClientError::Auth(format!(
                    "relay refused token ({})",
                    resp.status()
                )))
            }
            Err(e) => Err(ClientError::Transport(e.to_string())),
        }
    }

    /// One connection, from greeting to close.
    #[instrument(skip_all)]
    async fn run_session(&self, ws: WsStream) -> Result<(), ClientError> {
        let (mut sink, mut stream) = ws.split();

        let greeting = tokio::time::timeout(GREETING_TIMEOUT, next_server_message(&mut stream))
            .await
            .map_err(|_| ClientError::Transport("no greeting from relay".into()))??;
        match greeting {
            ServerMessage::ConnectionEstablished { data, .. } => {
                info!(conn_id = %data.connection_id, user_id = %data.user_id, "relay session established");
            }
            other => {
                return Err(ClientError::Transport(format!(
                    "unexpected first frame: {other:?}"
                )));
            }
        }

        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        {
            let mut reconciler = self.reconciler.lock().await;
            let resync = reconciler.on_connected()?;
            self.set_state(ConnectionState::Connected);
            for key in resync.joins {
                let frame = ClientMessage::Join { resource_id: key }.to_json()?;
                sink.send(Message::text(frame))
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
            }
            *self.outbound.lock() = Some(tx);
            if resync.refetch {
                let report = reconciler.refetch_all().await?;
                for failure in report.failures {
                    let _ = self.failures_tx.send(failure);
                }
            }
        }

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(frame) = rx.recv() => {
                    sink.send(Message::text(frame))
                        .await
                        .map_err(|e| ClientError::Transport(e.to_string()))?;
                }
                message = next_server_message(&mut stream) => {
                    self.handle_server_message(message?).await;
                }
            }
        }
    }

    async fn handle_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Updated(update) => {
                let outcome = self.reconciler.lock().await.apply_update(&update);
                if outcome == MergeOutcome::Applied {
                    let _ = self.updates_tx.send(update);
                }
            }
            ServerMessage::Error { code, message } => {
                warn!(%code, %message, "relay rejected a frame");
            }
            ServerMessage::Joined {
                resource_id,
                members,
            } => debug!(resource = %resource_id, members, "joined"),
            ServerMessage::Left { resource_id } => debug!(resource = %resource_id, "left"),
            ServerMessage::Pong | ServerMessage::ConnectionEstablished { .. } => {}
        }
    }
}

/// Next decodable server frame. Ends with `Transport` when the socket closes.
async fn next_server_message<S>(stream: &mut S) -> Result<ServerMessage, ClientError>
where
    S: futures::Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Some(Ok(Message::Close(frame))) => {
                return Err(ClientError::Transport(format!(
                    "relay closed the connection: {frame:?}"
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
            None => return Err(ClientError::Transport("relay connection ended".into())),
        };
        match ServerMessage::parse(&text) {
            Ok(message) => return Ok(message),
            Err(e) => warn!(error = %e, "ignoring undecodable relay frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ResourceSnapshot;
    use async_trait::async_trait;
    use huddle_core::{EntityId, EntityKind, FieldMap};

    struct EmptyCrud;

    #[async_trait]
    impl CrudApi for EmptyCrud {
        async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceSnapshot, ClientError> {
            Ok(ResourceSnapshot::new(key.clone()))
        }
    }

    fn client(url: &str) -> RealtimeClient {
        RealtimeClient::new(
            ClientConfig {
                relay_url: url.into(),
                token: "tok".into(),
                reconnect: ReconnectPolicy {
                    base_delay_ms: 10,
                    max_delay_ms: 50,
                    jitter_factor: 0.0,
                },
            },
            Arc::new(EmptyCrud),
        )
    }

    #[test]
    fn config_from_settings() {
        let config = ClientConfig::from_settings(&ClientSettings::default(), "t");
        assert!(config.relay_url.ends_with("/ws"));
        assert_eq!(config.reconnect.base_delay_ms, 500);
    }

    #[tokio::test]
    async fn emit_while_disconnected_is_dropped() {
        let c = client("ws://127.0.0.1:1/ws");
        let mut fields = FieldMap::new();
        let _ = fields.insert("content".into(), "x".into());
        let event = UpdateEvent::for_entity(EntityKind::Block, EntityId::from("block:1"), fields);
        assert!(!c.emit_update(ResourceKey::page("1").unwrap(), event).unwrap());
    }

    #[tokio::test]
    async fn emit_rejects_invalid_event() {
        let c = client("ws://127.0.0.1:1/ws");
        let event =
            UpdateEvent::for_entity(EntityKind::Block, EntityId::from("block:1"), FieldMap::new());
        assert!(matches!(
            c.emit_update(ResourceKey::page("1").unwrap(), event),
            Err(ClientError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn watch_while_disconnected_loads_snapshot() {
        let c = client("ws://127.0.0.1:1/ws");
        c.watch(ResourceKey::page("1").unwrap()).await.unwrap();
        assert_eq!(c.with_view(LocalView::len).await, 1);
        c.unwatch(&ResourceKey::page("1").unwrap()).await.unwrap();
        assert!(c.with_view(LocalView::is_empty).await);
    }

    #[tokio::test]
    async fn unreachable_relay_retries_until_cancelled() {
        let c = Arc::new(client("ws://127.0.0.1:1/ws"));
        let runner = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.run().await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!runner.is_finished());
        c.cancel_token().cancel();
        assert!(runner.await.unwrap().is_ok());
        assert_eq!(c.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_immediately() {
        let c = client("ws://127.0.0.1:1/ws");
        c.cancel_token().cancel();
        assert!(c.run().await.is_ok());
    }
}
