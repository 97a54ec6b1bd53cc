//! Shared helpers for router-level tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use productivity_auth::{
    ServerConfig, create_app,
    db::Database,
    jwt::{JwtConfig, TokenIssuer},
};

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-at-least-32-bytes!!";
pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Create a test app and return (app, db, issuer).
/// The issuer signs with the same secret as the app.
pub async fn create_test_app(secure_cookies: bool) -> (Router, Database, TokenIssuer) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        secure_cookies,
        revocation_timeout: Duration::from_millis(2000),
        cors_origins: vec![TEST_ORIGIN.to_string()],
    };
    let app = create_app(&config).expect("Failed to create app");
    let issuer = TokenIssuer::new(JwtConfig::new(TEST_SECRET).expect("Invalid secret"));
    (app, db, issuer)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

/// Find a freshly issued access token cookie
pub fn new_access_cookie(cookies: &[String]) -> Option<&String> {
    cookies
        .iter()
        .find(|c| c.starts_with("access_token=") && !c.contains("Max-Age=0"))
}

/// Value part of a `name=value; ...` cookie string
pub fn cookie_value(cookie: &str) -> &str {
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or("")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
