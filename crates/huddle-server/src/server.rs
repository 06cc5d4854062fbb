//! `HuddleServer`: Axum HTTP + `WebSocket` relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use huddle_auth::Authenticator;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_AUTH_FAILURES_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::RelayHub;
use crate::websocket::session::run_ws_session;

/// Code returned with 503 when `max_connections` are live.
pub const CAPACITY_EXCEEDED: &str = "CAPACITY_EXCEEDED";
/// Code returned with 503 once shutdown has begun.
pub const SHUTTING_DOWN: &str = "SHUTTING_DOWN";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connections, rooms and fan-out.
    pub hub: Arc<RelayHub>,
    /// Upgrade authentication.
    pub authenticator: Authenticator,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// One permit per live connection.
    pub capacity: Arc<Semaphore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus renderer.
    pub metrics: PrometheusHandle,
}

/// The relay server.
pub struct HuddleServer {
    state: AppState,
}

impl HuddleServer {
    /// Create a server. Nothing is bound until [`listen`](Self::listen).
    pub fn new(
        config: ServerConfig,
        authenticator: Authenticator,
        metrics: PrometheusHandle,
    ) -> Self {
        let capacity = Arc::new(Semaphore::new(
            config.max_connections.min(Semaphore::MAX_PERMITS),
        ));
        Self {
            state: AppState {
                hub: Arc::new(RelayHub::new(config.max_total_drops)),
                authenticator,
                config: Arc::new(config),
                capacity,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics,
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind `host:port` and serve in the background until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let config = &self.state.config;
        let addr = format!("{}:{}", config.host, config.port);
        let bind_err = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server terminated with error");
            }
        });

        info!(%local_addr, "huddle relay listening");
        Ok((local_addr, handle))
    }

    /// Connections, rooms and fan-out.
    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.state.hub
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = json!({"code": code, "message": message.into()});
    (status, Json(body)).into_response()
}

/// GET /ws: authenticate, check capacity, then upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_draining() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            SHUTTING_DOWN,
            "server is shutting down",
        );
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let identity = match state
        .authenticator
        .authenticate(auth_header, query.token.as_deref())
        .await
    {
        Ok(identity) => identity,
        Err(err) => {
            counter!(WS_AUTH_FAILURES_TOTAL, "code" => err.code()).increment(1);
            warn!(code = err.code(), error = %err, "rejecting upgrade");
            let status = if err.is_unauthorized() {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return error_response(status, err.code(), err.to_string());
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let Ok(permit) = Arc::clone(&state.capacity).try_acquire_owned() else {
        warn!(
            max_connections = state.config.max_connections,
            "connection limit reached"
        );
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            CAPACITY_EXCEEDED,
            "too many connections",
        );
    };

    let frame_limit = state.config.transport_frame_limit();
    ws.max_message_size(frame_limit)
        .max_frame_size(frame_limit)
        .on_upgrade(move |socket| async move {
            let _permit = permit;
            let cancel = state.shutdown.session_token();
            run_ws_session(socket, identity, state.hub, state.config, cancel).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    let rooms = state.hub.rooms().room_count().await;
    Json(health::health_check(
        state.start_time,
        connections,
        rooms,
        state.shutdown.is_draining(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
