mod health;
mod response;
mod session;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::auth::{AuthSettings, HasAuthBackend, require_auth};
use crate::db::{Database, RevokedTokenStore};
use crate::jwt::TokenIssuer;

pub use response::{ApiError, Payload, ResultExt};

/// Shared state for API handlers and the authentication middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub issuer: Arc<TokenIssuer>,
    pub auth: AuthSettings,
}

impl HasAuthBackend for AppState {
    type Store = RevokedTokenStore;

    fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    fn revocations(&self) -> RevokedTokenStore {
        self.db.revoked()
    }

    fn auth_settings(&self) -> &AuthSettings {
        &self.auth
    }
}

/// Create the API router.
///
/// - GET `/health` - liveness, public
/// - GET `/health/protected` - liveness behind authentication, echoes claims
/// - POST `/auth/logout` - revoke the access token and clear both cookies
pub fn create_api_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/health/protected", get(health::health_protected))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<AppState>,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/logout", post(session::logout))
        .merge(protected)
        .with_state(state)
}
