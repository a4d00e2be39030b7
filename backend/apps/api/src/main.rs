//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use anyhow::Context;
use auth::{AuthConfig, PgAuthRepository, SigningKey, TokenSigner, TracingEventPublisher, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Startup cleanup: expired refresh and reset tokens
    // Errors here should not prevent server startup
    let auth_repo = PgAuthRepository::new(pool.clone());
    if let Err(e) = auth_repo.cleanup_expired().await {
        tracing::warn!(
            error = %e,
            "Auth token cleanup failed, continuing anyway"
        );
    }

    // Auth configuration
    let auth_config = load_auth_config()?;
    let signing_key = SigningKey::from_config(env::var("JWT_SECRET_KEY").ok().as_deref())
        .context("JWT_SECRET_KEY is not usable")?;
    if signing_key.is_generated() && !cfg!(debug_assertions) {
        tracing::warn!("Running a release build with an ephemeral JWT signing key");
    }
    let signer = Arc::new(TokenSigner::new(signing_key, auth_config.jwt_issuer.clone()));

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest(
            "/api/auth",
            auth_router(auth_repo, auth_config, signer, Arc::new(TracingEventPublisher)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:31113".to_string())
        .parse()
        .context("BIND_ADDR must be host:port")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Defaults per build profile, overridden by environment
fn load_auth_config() -> anyhow::Result<AuthConfig> {
    let mut config = if cfg!(debug_assertions) {
        AuthConfig::development()
    } else {
        AuthConfig::default()
    };

    if let Some(flag) = env_flag("AUTH_REQUIRE_TOTP")? {
        config.require_totp = flag;
    }
    if let Some(flag) = env_flag("AUTH_REQUIRE_TOTP_FOR_ELEVATED")? {
        config.require_totp_for_elevated = flag;
    }
    if let Ok(issuer) = env::var("TOTP_ISSUER") {
        config.totp_issuer = issuer;
    }
    if let Ok(issuer) = env::var("JWT_ISSUER") {
        config.jwt_issuer = issuer;
    }
    if let Some(ttl) = env_secs("ACCESS_TOKEN_TTL_SECS")? {
        config.access_token_ttl = ttl;
    }
    if let Some(ttl) = env_secs("REFRESH_TOKEN_TTL_SECS")? {
        config.refresh_token_ttl = ttl;
    }
    if let Some(ttl) = env_secs("RESET_TOKEN_TTL_SECS")? {
        config.reset_token_ttl = ttl;
    }
    if let Ok(pepper_b64) = env::var("PASSWORD_PEPPER") {
        let pepper = Engine::decode(&general_purpose::STANDARD, pepper_b64.trim())
            .context("PASSWORD_PEPPER must be base64")?;
        config.password_pepper = Some(pepper);
    }

    tracing::info!(
        require_totp = config.require_totp,
        require_totp_for_elevated = config.require_totp_for_elevated,
        access_token_ttl_secs = config.access_token_ttl.as_secs(),
        refresh_token_ttl_secs = config.refresh_token_ttl.as_secs(),
        pepper = config.password_pepper.is_some(),
        "Auth configuration loaded"
    );

    Ok(config)
}

fn env_flag(name: &str) -> anyhow::Result<Option<bool>> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            other => anyhow::bail!("{name} must be a boolean (got {other:?})"),
        },
        Err(_) => Ok(None),
    }
}

fn env_secs(name: &str) -> anyhow::Result<Option<Duration>> {
    match env::var(name) {
        Ok(value) => {
            let secs: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a number of seconds"))?;
            anyhow::ensure!(secs > 0, "{name} must be positive");
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
