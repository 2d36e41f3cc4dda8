//! # Actix Middleware Library
//!
//! Middleware components for Nova Actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer-token authorization gate
//! - `logging`: request logging with request-id propagation

pub mod jwt_auth;
pub mod logging;

pub use jwt_auth::{authorize, AuthError, AuthenticatedUser, JwtAuthMiddleware};
pub use logging::{RequestLogging, REQUEST_ID_HEADER};
