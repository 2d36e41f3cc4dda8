//! Shared cryptographic primitives for Nova services
//!
//! - `jwt`: bearer token issuance and parsing (HS256, one secret per token class)
//! - `hash`: SHA-256 digests for storing token fingerprints

pub mod hash;
pub mod jwt;

pub use jwt::{Claims, JwtCodec, TokenError, TokenIssuer, TokenKind, TokenParser};
