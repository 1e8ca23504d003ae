//! Refresh token cookie helpers
//!
//! The refresh token travels in an HttpOnly, Secure, cross-site cookie
//! scoped to the whole API.

use axum::http::{header, HeaderMap, HeaderValue};

/// Name of the refresh token cookie
pub const REFRESH_COOKIE: &str = "refresh_token";

/// `Set-Cookie` value carrying a refresh token
pub fn refresh_cookie(
    token: &str,
    max_age_secs: u64,
) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}={token}; HttpOnly; Secure; SameSite=None; Max-Age={max_age_secs}; Path=/"
    ))
}

/// `Set-Cookie` value that makes the client drop the refresh token
pub fn clear_refresh_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "refresh_token=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=None; Path=/",
    )
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
