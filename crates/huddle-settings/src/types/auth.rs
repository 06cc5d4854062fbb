//! Bearer-token verification settings.

use serde::{Deserialize, Serialize};

/// How bearer tokens are verified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// HS256 JWTs issued by the auth service.
    #[default]
    Jwt,
    /// Fixed token table, for development and tests.
    Static,
}

/// One entry of the static token table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticToken {
    /// The bearer token.
    pub token: String,
    /// User it resolves to.
    pub user_id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Auth settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Verification mode.
    pub mode: AuthMode,
    /// HS256 shared secret. Usually supplied through `HUDDLE_JWT_SECRET`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt_secret: String,
    /// Expected `iss` claim, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Expected `aud` claim, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Token ids (`jti`) that are no longer accepted.
    pub revoked_jtis: Vec<String>,
    /// Users whose tokens resolve but who are no longer active.
    pub disabled_users: Vec<String>,
    /// Token table used when `mode` is `static`.
    pub static_tokens: Vec<StaticToken>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mode: AuthMode::Jwt,
            jwt_secret: String::new(),
            issuer: None,
            audience: None,
            revoked_jtis: Vec::new(),
            disabled_users: Vec::new(),
            static_tokens: Vec::new(),
        }
    }
}
