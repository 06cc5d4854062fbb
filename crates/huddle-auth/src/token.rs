//! Locating the bearer token on an upgrade request.

use crate::errors::AuthError;

/// Parse an `Authorization` header value as `Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let raw = header_value.ok_or(AuthError::MissingToken)?.trim();
    let Some((scheme, token)) = raw.split_once(' ') else {
        return Err(AuthError::InvalidScheme);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidScheme);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidScheme);
    }
    Ok(token)
}

/// Pick the token for an upgrade: header first, then `?token=`.
///
/// Browsers cannot attach headers to a WebSocket handshake, hence the
/// query fallback. A present-but-malformed header is an error even when a
/// query token exists.
pub fn resolve_token<'a>(
    header_value: Option<&'a str>,
    query_token: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    if header_value.is_some() {
        return extract_bearer_token(header_value);
    }
    match query_token.map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingToken),
    }
}
