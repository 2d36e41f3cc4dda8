/// Identity Service Library
///
/// Provides account registration, authentication and session management for
/// Nova backend.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: User store contract and in-memory implementation
/// - `domain`: User aggregate and value objects
/// - `error`: Error types
/// - `http`: Actix JSON API
/// - `security`: Password hashing, id generation
/// - `services`: Identity orchestrator and email delivery
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod http;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{ErrorKind, IdentityError, Result};
pub use services::{IdentityPolicy, IdentityService};
