//! # huddle-auth
//!
//! Authenticates a realtime connection once, before the WebSocket upgrade.
//!
//! - [`extract_bearer_token`] / [`resolve_token`] pull the token from the
//!   `Authorization` header or the `?token=` query fallback
//! - [`TokenVerifier`] turns a token into a [`UserIdentity`]
//!   ([`JwtVerifier`] for HS256, [`StaticTokenVerifier`] for development)
//! - [`UserDirectory`] decides whether the resolved user is still active
//! - [`Authenticator`] composes the three and is what the server holds

#![deny(unsafe_code)]

pub mod authenticator;
pub mod directory;
pub mod errors;
pub mod token;
pub mod verifier;

pub use authenticator::Authenticator;
pub use directory::{AllowAllUsers, StaticUserDirectory, UserDirectory};
pub use errors::AuthError;
pub use token::{extract_bearer_token, resolve_token};
pub use verifier::{JwtClaims, JwtVerifier, StaticTokenVerifier, TokenVerifier, UserIdentity};
