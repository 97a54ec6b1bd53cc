//! Session endpoints.
//!
//! - POST `/auth/logout` - Revoke the access token and clear both cookies

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use tracing::{debug, info};

use super::AppState;
use super::response::{ApiError, Payload, ResultExt};
use crate::auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, build_expired_cookie, get_cookie};

/// Logout - revoke the presented access token and clear both cookies.
///
/// Works without valid credentials: an unverifiable access token has nothing
/// worth revoking, and the cookies are cleared either way.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(access_token) = get_cookie(&headers, ACCESS_COOKIE_NAME) {
        match state.issuer.jwt().verify(access_token) {
            Ok(claims) => {
                state
                    .db
                    .revoked()
                    .revoke(access_token, Some("logout"), claims.exp)
                    .await
                    .db_err("Failed to revoke access token")?;
                info!(email = %claims.email, "Access token revoked on logout");
            }
            Err(e) => debug!(error = %e, "Logout with unverifiable access token"),
        }
    }

    let secure = state.auth.secure_cookies;
    let clear_access = build_expired_cookie(ACCESS_COOKIE_NAME, secure).to_header_string();
    let clear_refresh = build_expired_cookie(REFRESH_COOKIE_NAME, secure).to_header_string();

    Ok((
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Payload::message(StatusCode::OK, "Logged out"),
    ))
}
