//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::TokenIssuer;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    Development,
    #[default]
    Production,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "productivity-auth",
    about = "Cookie-based authentication gate for the productivity API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8081")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "productivity.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Deployment profile. Cookies are marked Secure unless this is development
    #[arg(long, env = "APP_PROFILE", value_enum, default_value = "production")]
    pub profile: Profile,

    /// Never set the Secure flag on cookies, whatever the profile
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Milliseconds to wait for a revocation lookup before rejecting the request
    #[arg(long, default_value = "2000")]
    pub revocation_timeout_ms: u64,

    /// Origin allowed to make credentialed cross-origin requests (repeatable)
    #[arg(long = "cors-origin", default_value = "http://localhost:3000")]
    pub cors_origins: Vec<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Mint an access/refresh token pair for this email, print it and exit
    #[arg(long, value_name = "EMAIL")]
    pub issue_token: Option<String>,

    /// Display name for --issue-token (defaults to the email)
    #[arg(long, requires = "issue_token")]
    pub name: Option<String>,

    /// Role for --issue-token
    #[arg(long, default_value = "user")]
    pub role: String,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: Called from main before any task is spawned. The runtime's
        // worker threads exist but nothing running on them reads or writes
        // the environment.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if !secret_is_long_enough(&secret) {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

fn secret_is_long_enough(secret: &str) -> bool {
    secret.len() >= MIN_JWT_SECRET_LENGTH
}

/// Decide the cookie Secure flag from the profile and the explicit override.
pub fn secure_cookies(profile: Profile, insecure_cookies: bool) -> bool {
    if insecure_cookies {
        if profile == Profile::Production {
            warn!("Secure cookie flag disabled in production profile");
        }
        return false;
    }
    profile != Profile::Development
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies: secure_cookies(args.profile, args.insecure_cookies),
        revocation_timeout: Duration::from_millis(args.revocation_timeout_ms),
        cors_origins: args.cors_origins.clone(),
    }
}

/// Handle the --issue-token flag: mint a token pair and print both tokens.
/// Returns false if issuance failed.
pub fn handle_issue_token(issuer: &TokenIssuer, email: &str, name: &str, role: &str) -> bool {
    match issuer.issue_pair(email, name, role) {
        Ok(pair) => {
            println!();
            println!("Access token ({}s):", pair.access.duration);
            println!("{}", pair.access.token);
            println!();
            println!("Refresh token ({}s):", pair.refresh.duration);
            println!("{}", pair.refresh.token);
            println!();
            true
        }
        Err(e) => {
            error!(email = %email, error = %e, "Failed to issue tokens");
            false
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            match db.revoked().count().await {
                Ok(revoked) => info!(path = %path, revoked, "Database opened"),
                Err(e) => warn!(path = %path, error = %e, "Database opened, count failed"),
            }
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
