//! Cookie parsing and `Set-Cookie` construction for authentication tokens.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::timestamp::{to_http_date, unix_now};

/// Cookie name for the access token (short-lived, 5 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// How far in the past an expired cookie's `Expires` is set.
const EXPIRED_COOKIE_AGE_SECS: u64 = 60 * 60;

/// Extract a cookie value from the Cookie headers. Empty values count as absent.
///
/// HTTP/2 clients may split cookies over several `cookie` fields, so every
/// field is searched. The first pair with a matching name wins.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            if let Some((key, value)) = part.trim().split_once('=') {
                if key.trim() == name {
                    let value = value.trim();
                    return (!value.is_empty()).then_some(value);
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
        }
    }
}

/// Attributes of a cookie to send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub path: &'static str,
    /// Absolute expiry (Unix timestamp)
    pub expires: u64,
    pub max_age: u64,
    pub http_only: bool,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookieSpec {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_string(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Expires={}; Max-Age={}",
            self.name,
            self.value,
            self.path,
            to_http_date(self.expires),
            self.max_age
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn to_header_value(&self) -> Result<HeaderValue, header::InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_header_string())
    }
}

/// Cookie holding `value` for `ttl` seconds from now.
pub fn build_cookie(name: &str, value: &str, ttl: u64, secure: bool) -> CookieSpec {
    build_cookie_at(unix_now(), name, value, ttl, secure)
}

pub fn build_cookie_at(now: u64, name: &str, value: &str, ttl: u64, secure: bool) -> CookieSpec {
    CookieSpec {
        name: name.to_string(),
        value: value.to_string(),
        path: "/",
        expires: now + ttl,
        max_age: ttl,
        http_only: true,
        same_site: SameSite::Strict,
        secure,
    }
}

/// Cookie that tells the client to discard `name`.
pub fn build_expired_cookie(name: &str, secure: bool) -> CookieSpec {
    build_expired_cookie_at(unix_now(), name, secure)
}

pub fn build_expired_cookie_at(now: u64, name: &str, secure: bool) -> CookieSpec {
    CookieSpec {
        name: name.to_string(),
        value: String::new(),
        path: "/",
        expires: now.saturating_sub(EXPIRED_COOKIE_AGE_SECS),
        max_age: 0,
        http_only: true,
        same_site: SameSite::Strict,
        secure,
    }
}
