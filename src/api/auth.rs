//! Typed session principals for the three client surfaces.
//!
//! Each surface authenticates with its own opaque cookie
//! (`app_session`, `chair_session`, `owner_session`). The extractors
//! resolve the token against the identity caches and hand the handler
//! a strongly typed principal; a missing or unknown token rejects the
//! request with 401 before the handler body runs.

use std::fmt::Write as _;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use rand::RngCore;

use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::persistence::models::{Chair, Owner, User};

/// The rider bound to the request's `app_session` cookie.
#[derive(Debug)]
pub struct SessionUser(pub User);

/// The chair bound to the request's `chair_session` cookie.
#[derive(Debug)]
pub struct SessionChair(pub Chair);

/// The owner bound to the request's `owner_session` cookie.
#[derive(Debug)]
pub struct SessionOwner(pub Owner);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(parts, "app_session")
            .ok_or(GatewayError::Unauthorized("app_session cookie is required"))?;
        let user = state
            .cache
            .user_by_token(token)
            .await
            .ok_or(GatewayError::Unauthorized("invalid session token"))?;
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for SessionChair {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(parts, "chair_session").ok_or(GatewayError::Unauthorized(
            "chair_session cookie is required",
        ))?;
        let chair = state
            .cache
            .chair_by_token(token)
            .await
            .ok_or(GatewayError::Unauthorized("invalid session token"))?;
        Ok(Self(chair))
    }
}

impl FromRequestParts<AppState> for SessionOwner {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(parts, "owner_session").ok_or(GatewayError::Unauthorized(
            "owner_session cookie is required",
        ))?;
        let owner = state
            .cache
            .owner_by_token(token)
            .await
            .ok_or(GatewayError::Unauthorized("invalid session token"))?;
        Ok(Self(owner))
    }
}

/// Extracts a cookie value from the request headers.
fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    for header in parts.headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=')
                && key == name
            {
                return Some(value);
            }
        }
    }
    None
}

/// Mints a hex-encoded random secret of `bytes` random bytes.
///
/// Used for session tokens (32 bytes), chair-register tokens (32) and
/// invitation codes (15).
#[must_use]
pub fn mint_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().fold(String::with_capacity(bytes * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// `Set-Cookie` header value for a session cookie on path `/`.
#[must_use]
pub fn session_cookie(name: &str, token: &str) -> String {
    format!("{name}={token}; Path=/")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(value: &str) -> Parts {
        let request = Request::builder()
            .header(COOKIE, value)
            .body(())
            .unwrap_or_default();
        request.into_parts().0
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let parts = parts_with_cookie("foo=1; app_session=tok-abc; bar=2");
        assert_eq!(cookie_value(&parts, "app_session"), Some("tok-abc"));
        assert_eq!(cookie_value(&parts, "chair_session"), None);
    }

    #[test]
    fn mint_secret_is_hex_of_requested_length() {
        let secret = mint_secret(32);
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, mint_secret(32));
    }

    #[test]
    fn session_cookie_sets_root_path() {
        assert_eq!(
            session_cookie("app_session", "tok"),
            "app_session=tok; Path=/"
        );
    }
}
