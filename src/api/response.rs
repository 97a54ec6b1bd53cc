//! JSON response envelope and shared API error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Body of every API response: `{"status": 200, "message": "...", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Payload<T = ()> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip)]
    code: StatusCode,
}

impl Payload<()> {
    /// Envelope without data.
    pub fn message(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: code.as_u16(),
            message: message.into(),
            data: None,
            code,
        }
    }
}

impl<T: Serialize> Payload<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_data(StatusCode::OK, message, data)
    }

    pub fn with_data(code: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status: code.as_u16(),
            message: message.into(),
            data: Some(data),
            code,
        }
    }
}

impl<T: Serialize> IntoResponse for Payload<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
}

impl ApiError {
    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        Payload::message(status, message).into_response()
    }
}
