//! Token lookup, verification and activity check in one call.

use std::sync::Arc;

use huddle_settings::{AuthMode, AuthSettings};
use tracing::debug;

use crate::directory::{AllowAllUsers, StaticUserDirectory, UserDirectory};
use crate::errors::AuthError;
use crate::token::resolve_token;
use crate::verifier::{JwtVerifier, StaticTokenVerifier, TokenVerifier, UserIdentity};

/// What the server consults before upgrading a connection.
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn UserDirectory>,
}

impl Authenticator {
    /// Compose a verifier and a directory.
    pub fn new(verifier: Arc<dyn TokenVerifier>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            verifier,
            directory,
        }
    }

    /// Verifier with every user treated as active.
    pub fn with_verifier(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self::new(verifier, Arc::new(AllowAllUsers))
    }

    /// Build from the `auth` settings section.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let verifier: Arc<dyn TokenVerifier> = match settings.mode {
            AuthMode::Jwt => Arc::new(JwtVerifier::from_settings(settings)?),
            AuthMode::Static => Arc::new(StaticTokenVerifier::from_entries(&settings.static_tokens)),
        };
        let directory: Arc<dyn UserDirectory> = if settings.disabled_users.is_empty() {
            Arc::new(AllowAllUsers)
        } else {
            Arc::new(StaticUserDirectory::with_disabled(
                settings.disabled_users.iter().cloned(),
            ))
        };
        Ok(Self::new(verifier, directory))
    }

    /// Authenticate an upgrade request.
    ///
    /// `header_value` is the raw `Authorization` header and `query_token`
    /// the `?token=` parameter.
    pub async fn authenticate(
        &self,
        header_value: Option<&str>,
        query_token: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        let token = resolve_token(header_value, query_token)?;
        let identity = self.verifier.verify(token)?;
        if !self.directory.is_active(&identity.user_id).await {
            debug!(user_id = %identity.user_id, "rejecting inactive user");
            return Err(AuthError::InactiveUser(identity.user_id));
        }
        Ok(identity)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
