//! Authentication error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::Payload;

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Neither a usable access token nor a refresh token was presented
    MissingCredentials,
    /// The refresh token failed verification
    InvalidRefreshCredentials,
    /// The access token verifies but has been revoked
    TokenRevoked,
    /// The revocation store could not answer
    RevocationCheckFailed,
    /// Minting a new access token failed
    IssuanceFailure,
}

impl RejectReason {
    /// Server-side faults, as opposed to credentials the client must replace.
    pub fn is_server_fault(self) -> bool {
        matches!(
            self,
            RejectReason::RevocationCheckFailed | RejectReason::IssuanceFailure
        )
    }

    pub fn status_code(self) -> StatusCode {
        if self.is_server_fault() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RejectReason::MissingCredentials => "Missing credentials",
            RejectReason::InvalidRefreshCredentials => "Invalid credentials",
            RejectReason::TokenRevoked => "Token has been revoked",
            RejectReason::RevocationCheckFailed | RejectReason::IssuanceFailure => "Server error",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            RejectReason::MissingCredentials => "missing credentials",
            RejectReason::InvalidRefreshCredentials => "invalid refresh credentials",
            RejectReason::TokenRevoked => "token revoked",
            RejectReason::RevocationCheckFailed => "revocation check failed",
            RejectReason::IssuanceFailure => "issuance failure",
        };
        f.write_str(reason)
    }
}

/// API authentication error rendered as a JSON payload.
/// Cookies are left untouched.
#[derive(Debug)]
pub struct ApiAuthError {
    reason: RejectReason,
}

impl ApiAuthError {
    pub fn reason(&self) -> RejectReason {
        self.reason
    }
}

impl From<RejectReason> for ApiAuthError {
    fn from(reason: RejectReason) -> Self {
        Self { reason }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        Payload::message(self.reason.status_code(), self.reason.message()).into_response()
    }
}
