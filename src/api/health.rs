//! Health check endpoints.

use axum::http::StatusCode;

use super::response::Payload;
use crate::auth::CurrentUser;
use crate::jwt::Claims;

pub async fn health() -> Payload {
    Payload::message(StatusCode::OK, "OK")
}

/// Same as `health`, but only reachable with valid credentials.
pub async fn health_protected(CurrentUser(claims): CurrentUser) -> Payload<Claims> {
    Payload::ok("OK", claims)
}
