//! Protocol error type and wire error codes.

// ── Error code constants ────────────────────────────────────────────

/// Frame was not valid JSON or did not match any known message shape.
pub const MALFORMED_FRAME: &str = "MALFORMED_FRAME";
/// Resource key was missing, empty, or of an unknown kind.
pub const INVALID_RESOURCE: &str = "INVALID_RESOURCE";
/// Update event payload failed validation.
pub const INVALID_EVENT: &str = "INVALID_EVENT";
/// Frame exceeded the configured maximum size.
pub const FRAME_TOO_LARGE: &str = "FRAME_TOO_LARGE";

/// Errors raised while decoding or validating relay frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame could not be parsed at all.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The resource key is not of the form `kind:id`.
    #[error("invalid resource key '{resource}': {reason}")]
    InvalidResource {
        /// The raw key as received.
        resource: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The update event is structurally valid JSON but breaks a field rule.
    #[error("invalid update event: {0}")]
    InvalidEvent(String),

    /// The frame is larger than the server accepts.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// Received size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl ProtocolError {
    /// Stable machine-readable code for wire error replies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => MALFORMED_FRAME,
            Self::InvalidResource { .. } => INVALID_RESOURCE,
            Self::InvalidEvent(_) => INVALID_EVENT,
            Self::FrameTooLarge { .. } => FRAME_TOO_LARGE,
        }
    }

    pub(crate) fn invalid_resource(resource: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResource {
            resource: resource.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
