/// HTTP API for identity-service
///
/// Thin JSON layer over `IdentityService`. Handlers resolve the caller via
/// the authorization gate, pass it to the orchestrator explicitly and map
/// `IdentityError` to a status code.
mod handlers;

pub use handlers::*;

use crate::error::IdentityError;
use crate::services::IdentityService;
use actix_middleware::JwtAuthMiddleware;
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use crypto_core::jwt::TokenParser;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, warn};

/// Shared HTTP server state
#[derive(Clone)]
pub struct HttpState {
    pub identity: Arc<IdentityService>,
    pub request_timeout: Duration,
}

impl HttpState {
    pub fn new(identity: Arc<IdentityService>, request_timeout: Duration) -> Self {
        Self {
            identity,
            request_timeout,
        }
    }

    fn scope(&self) -> RequestScope {
        RequestScope::new(self.request_timeout)
    }
}

/// Per-request cancellation.
///
/// The token is cancelled when the scope is dropped (the client went away
/// and actix dropped the handler future) or when the deadline passes.
struct RequestScope {
    cancel: CancellationToken,
    _guard: DropGuard,
    timeout: Duration,
}

impl RequestScope {
    fn new(timeout: Duration) -> Self {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        Self {
            cancel,
            _guard: guard,
            timeout,
        }
    }

    fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn run<T, F>(&self, fut: F) -> Result<T, IdentityError>
    where
        F: Future<Output = Result<T, IdentityError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                self.cancel.cancel();
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Request deadline exceeded");
                Err(IdentityError::Cancelled)
            }
        }
    }
}

impl ResponseError for IdentityError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(IdentityError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }))
    }
}

/// Register all identity routes under `/api/v1`
pub fn register_routes(cfg: &mut web::ServiceConfig, parser: Arc<dyn TokenParser>) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/v1")
            .route("/users", web::post().to(handlers::register))
            .route("/users/activate", web::post().to(handlers::activate))
            .route("/auth/login", web::post().to(handlers::login))
            .route("/auth/refresh", web::post().to(handlers::refresh))
            .route(
                "/auth/password-reset",
                web::post().to(handlers::reset_password),
            )
            .service(
                web::resource("/auth/logout")
                    .wrap(JwtAuthMiddleware::new(parser.clone()))
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::scope("/users/me")
                    .wrap(JwtAuthMiddleware::new(parser))
                    .route("", web::get().to(handlers::get_profile))
                    .route("", web::patch().to(handlers::update_profile))
                    .route("", web::delete().to(handlers::delete_account))
                    .route("/password", web::put().to(handlers::change_password))
                    .route("/email", web::put().to(handlers::change_email)),
            ),
    );
}

/// Health check endpoint (no auth required)
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
