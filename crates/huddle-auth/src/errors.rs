//! Authentication errors.

use huddle_core::UserId;

/// Why a connection could not be authenticated.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither the header nor the query parameter carried a token.
    #[error("missing bearer token")]
    MissingToken,
    /// `Authorization` header present but not `Bearer <token>`.
    #[error("invalid authorization scheme")]
    InvalidScheme,
    /// Signature, claims or format rejected.
    #[error("invalid token")]
    InvalidToken,
    /// `exp` is in the past.
    #[error("token expired")]
    TokenExpired,
    /// The token's `jti` has been revoked.
    #[error("token revoked")]
    TokenRevoked,
    /// The token resolved to a user that is no longer active.
    #[error("user {0} is not active")]
    InactiveUser(UserId),
    /// The verifier could not be built from settings.
    #[error("auth misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidScheme => "INVALID_SCHEME",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::InactiveUser(_) => "INACTIVE_USER",
            Self::Misconfigured(_) => "AUTH_MISCONFIGURED",
        }
    }

    /// Whether this should surface as HTTP 401.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, Self::Misconfigured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AuthError::MissingToken.code(), "MISSING_TOKEN");
        assert_eq!(AuthError::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(AuthError::InactiveUser("u".into()).code(), "INACTIVE_USER");
    }

    #[test]
    fn misconfiguration_is_not_unauthorized() {
        assert!(AuthError::InvalidToken.is_unauthorized());
        assert!(!AuthError::Misconfigured("no secret".into()).is_unauthorized());
    }

    #[test]
    fn display_includes_user() {
        let err = AuthError::InactiveUser("bob".into());
        assert_eq!(err.to_string(), "user bob is not active");
    }
}
