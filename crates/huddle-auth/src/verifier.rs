//! Token verifiers.

use std::collections::{HashMap, HashSet};

use huddle_core::UserId;
use huddle_settings::{AuthSettings, StaticToken};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Who a connection belongs to. Fixed for the connection's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable user id from the auth service.
    pub user_id: UserId,
    /// Display name, when the token carries one.
    pub display_name: Option<String>,
}

impl UserIdentity {
    /// Identity with no display name.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

/// Turns a raw bearer token into an identity.
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return the identity it carries.
    fn verify(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Claims issued by the auth service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id.
    pub sub: String,
    /// Expiry (seconds since the epoch).
    pub exp: u64,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token id, checked against the revocation list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// HS256 JWT verification.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    revoked_jtis: HashSet<String>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Build a verifier for `secret` with no issuer/audience checks.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        Self::build(secret, None, None, HashSet::new())
    }

    /// Build from the `auth` settings section.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        Self::build(
            &settings.jwt_secret,
            settings.issuer.as_deref(),
            settings.audience.as_deref(),
            settings.revoked_jtis.iter().cloned().collect(),
        )
    }

    fn build(
        secret: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
        revoked_jtis: HashSet<String>,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Misconfigured("jwt secret is empty".into()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            revoked_jtis,
        })
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let claims = match decode::<JwtClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(error) => {
                return Err(match error.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                });
            }
        };

        if claims
            .jti
            .as_ref()
            .is_some_and(|jti| self.revoked_jtis.contains(jti))
        {
            return Err(AuthError::TokenRevoked);
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(UserIdentity {
            user_id: UserId::from_string(claims.sub),
            display_name: claims.name,
        })
    }
}

/// Fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserIdentity>,
}

impl StaticTokenVerifier {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token that resolves to `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: UserIdentity) -> Self {
        let _ = self.tokens.insert(token.into(), identity);
        self
    }

    /// Build from the `staticTokens` settings table.
    pub fn from_entries(entries: &[StaticToken]) -> Self {
        let tokens = entries
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    UserIdentity {
                        user_id: UserId::from_string(entry.user_id.clone()),
                        display_name: entry.display_name.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap()
    }

    fn claims(sub: &str, exp: u64) -> JwtClaims {
        JwtClaims {
            sub: sub.to_string(),
            exp,
            name: None,
            jti: None,
            iss: None,
            aud: None,
        }
    }

    fn sign(claims: &JwtClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let verifier = JwtVerifier::new(SECRET).unwrap();
        let mut c = claims("alice", now() + 3600);
        c.name = Some("Alice".into());
        let identity = verifier.verify(&sign(&c, SECRET)).unwrap();
        assert_eq!(identity.user_id.as_str(), "alice");
        assert_eq!(identity.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn expired_token() {
        let verifier = JwtVerifier::new(SECRET).unwrap();
        let token = sign(&claims("alice", now() - 60), SECRET);
        assert_matches!(verifier.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let verifier = JwtVerifier::new(SECRET).unwrap();
        let token = sign(&claims("alice", now() + 3600), "other");
        assert_matches!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_is_invalid() {
        let verifier = JwtVerifier::new(SECRET).unwrap();
        assert_matches!(verifier.verify("not-a-jwt"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn revoked_jti() {
        let settings = AuthSettings {
            jwt_secret: SECRET.into(),
            revoked_jtis: vec!["jti-1".into()],
            ..AuthSettings::default()
        };
        let verifier = JwtVerifier::from_settings(&settings).unwrap();
        let mut c = claims("alice", now() + 3600);
        c.jti = Some("jti-1".into());
        assert_matches!(verifier.verify(&sign(&c, SECRET)), Err(AuthError::TokenRevoked));
        c.jti = Some("jti-2".into());
        assert!(verifier.verify(&sign(&c, SECRET)).is_ok());
    }

    #[test]
    fn issuer_and_audience_checked() {
        let settings = AuthSettings {
            jwt_secret: SECRET.into(),
            issuer: Some("huddle-auth".into()),
            audience: Some("huddle-relay".into()),
            ..AuthSettings::default()
        };
        let verifier = JwtVerifier::from_settings(&settings).unwrap();

        let mut c = claims("alice", now() + 3600);
        c.iss = Some("huddle-auth".into());
        c.aud = Some("huddle-relay".into());
        assert!(verifier.verify(&sign(&c, SECRET)).is_ok());

        c.aud = Some("someone-else".into());
        assert_matches!(verifier.verify(&sign(&c, SECRET)), Err(AuthError::InvalidToken));
    }

    #[test]
    fn blank_subject_is_invalid() {
        let verifier = JwtVerifier::new(SECRET).unwrap();
        let token = sign(&claims("  ", now() + 3600), SECRET);
        assert_matches!(verifier.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn empty_secret_is_misconfigured() {
        assert_matches!(JwtVerifier::new(""), Err(AuthError::Misconfigured(_)));
    }

    #[test]
    fn static_table() {
        let verifier = StaticTokenVerifier::new().with_token("dev-alice", UserIdentity::new("alice"));
        assert_eq!(verifier.verify("dev-alice").unwrap().user_id.as_str(), "alice");
        assert_matches!(verifier.verify("dev-bob"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn static_from_settings_entries() {
        let verifier = StaticTokenVerifier::from_entries(&[StaticToken {
            token: "t".into(),
            user_id: "carol".into(),
            display_name: Some("Carol".into()),
        }]);
        let identity = verifier.verify("t").unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Carol"));
    }
}
