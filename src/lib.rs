pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod timestamp;

use api::{AppState, create_api_router};
use auth::AuthSettings;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use db::Database;
use jwt::{JwtConfig, TokenError, TokenIssuer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Upper bound on a revocation lookup before the request is rejected
    pub revocation_timeout: Duration,
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_origins: Vec<String>,
}

/// Create the application router with the given configuration.
/// Fails only if the signing secret is unusable.
pub fn create_app(config: &ServerConfig) -> Result<Router, TokenError> {
    let jwt = JwtConfig::new(&config.jwt_secret)?;

    let state = AppState {
        db: config.db.clone(),
        issuer: Arc::new(TokenIssuer::new(jwt)),
        auth: AuthSettings {
            secure_cookies: config.secure_cookies,
            revocation_timeout: config.revocation_timeout,
        },
    };

    Ok(Router::new()
        .nest("/api", create_api_router(state))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http()))
}

/// CORS with credentials for the configured origins. Invalid origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::HEAD,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to prune stale revocations on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    axum::serve(listener, app).await
}
