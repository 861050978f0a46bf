//! Session cookies.
//!
//! Both tokens travel as `HttpOnly; Secure; SameSite=Strict` cookies whose
//! `Max-Age` matches the token lifetime.

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderName, HeaderValue,
};
use axum::response::AppendHeaders;

use crate::error::ApiError;
use crate::session::CredentialPair;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

const ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=Strict; Path=/";

/// `Set-Cookie` headers for both halves of a session.
pub type SessionCookies = AppendHeaders<[(HeaderName, HeaderValue); 2]>;

fn cookie(name: &str, value: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!("{name}={value}; {ATTRIBUTES}; Max-Age={max_age_secs}"))
        .map_err(|_| ApiError::internal("Failed to build session cookie"))
}

/// Cookies carrying a freshly issued pair.
pub fn set_session_cookies(
    pair: &CredentialPair,
    access_max_age: i64,
    refresh_max_age: i64,
) -> Result<SessionCookies, ApiError> {
    Ok(AppendHeaders([
        (SET_COOKIE, cookie(ACCESS_COOKIE, &pair.access_token, access_max_age)?),
        (SET_COOKIE, cookie(REFRESH_COOKIE, &pair.refresh_token, refresh_max_age)?),
    ]))
}

/// Cookies that expire both tokens immediately.
pub fn clear_session_cookies() -> Result<SessionCookies, ApiError> {
    Ok(AppendHeaders([
        (SET_COOKIE, cookie(ACCESS_COOKIE, "", 0)?),
        (SET_COOKIE, cookie(REFRESH_COOKIE, "", 0)?),
    ]))
}

/// Reads a cookie from every `Cookie` header on the request.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; refresh_token=abc.def"));

        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), Some("abc.def"));
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn test_empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token="));

        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let value = cookie(ACCESS_COOKIE, "tok", 60).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "access_token=tok; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=60"
        );
    }

    #[test]
    fn test_cleared_cookies_share_attributes() {
        let AppendHeaders(headers) = clear_session_cookies().unwrap();
        let values: Vec<_> = headers
            .iter()
            .map(|(name, value)| {
                assert_eq!(*name, SET_COOKIE);
                value.to_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(
            values,
            [
                format!("{ACCESS_COOKIE}=; {ATTRIBUTES}; Max-Age=0"),
                format!("{REFRESH_COOKIE}=; {ATTRIBUTES}; Max-Age=0"),
            ]
        );
    }
}
