//! Connection state machine.

use std::fmt;

use crate::errors::ClientError;

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. Initial state.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Handshake done, frames flowing.
    Connected,
}

impl ConnectionState {
    /// Lowercase name for logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state and whether a connection was ever lost.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    was_connected: bool,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Start disconnected.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            was_connected: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a `Connected` state has been reached before.
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    /// Move to `to`, or fail without changing state.
    ///
    /// Allowed: `Disconnected → Connecting`, `Connecting → Connected`,
    /// `Connecting → Disconnected`, `Connected → Disconnected`.
    pub fn transition(&mut self, to: ConnectionState) -> Result<ConnectionState, ClientError> {
        use ConnectionState::{Connected, Connecting, Disconnected};
        let from = self.state;
        let allowed = matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Connecting, Connected | Disconnected)
                | (Connected, Disconnected)
        );
        if !allowed {
            return Err(ClientError::InvalidTransition { from, to });
        }
        if from == Connected {
            self.was_connected = true;
        }
        self.state = to;
        Ok(from)
    }
}
