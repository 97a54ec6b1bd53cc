//! Revocation lookup consumed by the authentication gate.

use std::future::Future;
use std::time::Duration;

/// Read-only view of the set of revoked access tokens.
///
/// `Ok(false)` must mean the token is definitely not revoked. Anything the
/// store cannot answer is an `Err`, which the gate treats as a rejection.
pub trait RevocationStore: Send + Sync {
    fn is_revoked(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<bool, RevocationError>> + Send;
}

/// The revocation status of a token could not be determined.
#[derive(Debug)]
pub enum RevocationError {
    Database(sqlx::Error),
    Timeout(Duration),
}

impl std::fmt::Display for RevocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevocationError::Database(e) => write!(f, "Revocation lookup failed: {}", e),
            RevocationError::Timeout(after) => {
                write!(f, "Revocation lookup timed out after {:?}", after)
            }
        }
    }
}

impl std::error::Error for RevocationError {}

impl From<sqlx::Error> for RevocationError {
    fn from(e: sqlx::Error) -> Self {
        RevocationError::Database(e)
    }
}
