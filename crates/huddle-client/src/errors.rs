//! Client error types.

use huddle_core::ProtocolError;

use crate::state::ConnectionState;

/// Failure reported by the authoritative CRUD API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplicationError {
    /// Resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request was rejected as invalid (400/422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Write conflicted with current state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// API is down or returned something unusable.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ApplicationError {
    /// Stable machine code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// Map a non-success HTTP status to an application error.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            404 => Self::NotFound(detail),
            400 | 422 => Self::Validation(detail),
            409 => Self::Conflict(detail),
            _ => Self::Unavailable(format!("HTTP {status}: {detail}")),
        }
    }
}

/// Errors from the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Relay or CRUD API refused the credentials. Retrying will not help.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or `WebSocket` failure. Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// CRUD API failure.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// State machine refused a transition.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },
}

impl ClientError {
    /// Stable machine code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_FAILED",
            Self::Transport(_) => "TRANSPORT",
            Self::Application(e) => e.code(),
            Self::Protocol(e) => e.code(),
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Whether the reconnect loop should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Application(e) => matches!(e, ApplicationError::Unavailable(_)),
            _ => false,
        }
    }
}
