//! Bearer-token authorization gate
//!
//! Protected scopes are wrapped with [`JwtAuthMiddleware`]. A request passes
//! only if it carries `Authorization: Bearer <access token>` that verifies
//! against the configured [`TokenParser`]. The resolved caller is inserted
//! into request extensions as [`AuthenticatedUser`].

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header,
    Error, HttpMessage, HttpResponse,
};
use crypto_core::jwt::{TokenKind, TokenParser};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::sync::Arc;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    InvalidScheme,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Caller identity resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    /// Raw bearer token as presented
    pub token: String,
}

/// Extract, strip and verify a bearer token.
///
/// Only access tokens are accepted; refresh and verification tokens fail
/// with [`AuthError::InvalidToken`].
pub fn authorize(
    parser: &dyn TokenParser,
    header_value: Option<&str>,
) -> Result<AuthenticatedUser, AuthError> {
    let header_value = header_value.ok_or(AuthError::MissingHeader)?;
    let token = header_value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidScheme)?;

    if token.is_empty() {
        return Err(AuthError::InvalidScheme);
    }

    let claims = parser.parse(TokenKind::Access, token).map_err(|e| {
        tracing::warn!(error = %e, "JWT validation failed");
        AuthError::InvalidToken
    })?;

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        token: token.to_string(),
    })
}

fn unauthorized(err: AuthError) -> Error {
    let body = serde_json::json!({
        "error": err.to_string(),
        "status": 401,
    });
    InternalError::from_response(err, HttpResponse::Unauthorized().json(body)).into()
}

/// JWT Authentication Middleware
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    parser: Arc<dyn TokenParser>,
}

impl JwtAuthMiddleware {
    pub fn new(parser: Arc<dyn TokenParser>) -> Self {
        Self { parser }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service,
            parser: self.parser.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: S,
    parser: Arc<dyn TokenParser>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header_value = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match authorize(self.parser.as_ref(), header_value) {
            Ok(user) => {
                tracing::debug!(user_id = %user.user_id, path = %req.path(), "Request authorized");
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(err) => {
                tracing::debug!(path = %req.path(), reason = %err, "Request rejected");
                Box::pin(async move { Err(unauthorized(err)) })
            }
        }
    }
}

impl actix_web::FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(unauthorized(AuthError::MissingHeader))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::jwt::{JwtCodec, TokenIssuer};
    use std::time::Duration;

    fn codec() -> JwtCodec {
        JwtCodec::new(
            b"middleware-access-secret-0123456789abcdef",
            b"middleware-refresh-secret-0123456789abcdef",
        )
        .expect("valid secrets")
    }

    #[test]
    fn test_authorize_accepts_access_token() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "user-42", Duration::from_secs(60), None)
            .expect("should issue token");
        let header = format!("Bearer {token}");

        let user = authorize(&codec, Some(&header)).expect("should authorize");
        assert_eq!(user.user_id, "user-42");
        assert_eq!(user.token, token);
    }

    #[test]
    fn test_authorize_missing_header() {
        assert_eq!(authorize(&codec(), None), Err(AuthError::MissingHeader));
    }

    #[test]
    fn test_authorize_requires_bearer_prefix() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "user-42", Duration::from_secs(60), None)
            .expect("should issue token");

        assert_eq!(
            authorize(&codec, Some(&token)),
            Err(AuthError::InvalidScheme)
        );
        assert_eq!(
            authorize(&codec, Some(&format!("Basic {token}"))),
            Err(AuthError::InvalidScheme)
        );
        assert_eq!(authorize(&codec, Some("Bearer ")), Err(AuthError::InvalidScheme));
    }

    #[test]
    fn test_authorize_rejects_refresh_token() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Refresh, "user-42", Duration::from_secs(60), None)
            .expect("should issue token");

        assert_eq!(
            authorize(&codec, Some(&format!("Bearer {token}"))),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_authorize_rejects_garbage() {
        assert_eq!(
            authorize(&codec(), Some("Bearer not.a.jwt")),
            Err(AuthError::InvalidToken)
        );
    }
}
