/// Security module for authentication primitives
///
/// Provides the credential capabilities identity-service depends on:
/// - Password hashing and verification (Argon2id)
/// - User identifier generation (UUID v4)
///
/// Token issuance and parsing live in `crypto-core::jwt`.
pub mod ids;
pub mod password;

pub use ids::{IdGenerator, UuidGenerator};
pub use password::{Argon2PasswordHasher, PasswordHasher};
