use clap::Parser;
use productivity_auth::cli::{
    Args, build_config, handle_issue_token, init_logging, load_jwt_secret, open_database,
};
use productivity_auth::jwt::{JwtConfig, TokenIssuer};
use productivity_auth::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    if let Some(email) = args.issue_token.as_deref() {
        let issuer = match JwtConfig::new(jwt_secret.as_bytes()) {
            Ok(jwt) => TokenIssuer::new(jwt),
            Err(e) => {
                error!(error = %e, "Invalid JWT configuration");
                std::process::exit(1);
            }
        };
        let name = args.name.as_deref().unwrap_or(email);
        if !handle_issue_token(&issuer, email, name, &args.role) {
            std::process::exit(1);
        }
        return;
    }

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    init_cleanup(&db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, jwt_secret);

    match listener.local_addr() {
        Ok(local_addr) => info!(
            address = %local_addr,
            secure_cookies = config.secure_cookies,
            "Listening"
        ),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
