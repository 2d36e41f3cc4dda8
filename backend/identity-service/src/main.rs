/// Identity Service Main Entry Point
///
/// Starts the HTTP server with:
/// - In-memory user store
/// - Argon2id password hashing
/// - HS256 JWT issuance and validation
/// - Email service (SMTP or no-op)
use actix_middleware::RequestLogging;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use crypto_core::jwt::{JwtCodec, TokenParser};
use identity_service::{
    config::Settings,
    db::InMemoryUserStore,
    http::{register_routes, HttpState},
    security::{Argon2PasswordHasher, UuidGenerator},
    services::{Capabilities, EmailService, IdentityService},
};
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "identity_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let codec = Arc::new(
        JwtCodec::new(
            settings.jwt.access_secret.as_bytes(),
            settings.jwt.refresh_secret.as_bytes(),
        )
        .context("Failed to initialize JWT codec")?,
    );

    let email = EmailService::new(&settings.email).context("Failed to initialize email service")?;
    info!(smtp_enabled = email.is_enabled(), "Email service initialized");

    let identity = Arc::new(IdentityService::new(
        Capabilities {
            store: Arc::new(InMemoryUserStore::new()),
            hasher: Arc::new(Argon2PasswordHasher),
            ids: Arc::new(UuidGenerator),
            issuer: codec.clone(),
            parser: codec.clone(),
            email: Arc::new(email),
        },
        settings.identity_policy(),
    ));

    let state = HttpState::new(identity, settings.server.request_timeout());
    let parser: Arc<dyn TokenParser> = codec;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(address = %addr, "HTTP server listening");

    HttpServer::new(move || {
        let parser = parser.clone();
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(RequestLogging)
            .configure(|cfg| register_routes(cfg, parser))
    })
    .bind(&addr)
    .with_context(|| format!("Failed to bind {addr}"))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Identity Service stopped");
    Ok(())
}
