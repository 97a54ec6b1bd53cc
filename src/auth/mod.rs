//! Cookie-based JWT authentication.
//!
//! Dual-token system: short-lived access tokens (5 min) checked against a
//! revocation store, and long-lived refresh tokens (7 days) used to mint new
//! access tokens transparently when the access token is missing or invalid.

mod cookie;
mod errors;
mod gate;
mod middleware;
mod revocation;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSpec, REFRESH_COOKIE_NAME, SameSite, build_cookie,
    build_cookie_at, build_expired_cookie, build_expired_cookie_at, get_cookie,
};
pub use errors::{ApiAuthError, RejectReason};
pub use gate::{Admission, AuthSettings, Credentials, DEFAULT_REVOCATION_TIMEOUT, Gate};
pub use middleware::{CurrentUser, require_auth};
pub use revocation::{RevocationError, RevocationStore};
pub use state::HasAuthBackend;
