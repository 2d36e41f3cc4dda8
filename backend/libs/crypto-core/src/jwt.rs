/// Shared JWT issuance and validation for Nova services
///
/// Bearer tokens are self-contained HS256 JWTs. Each token class is bound to
/// its own secret and carries a `token_type` claim, so a token minted for one
/// purpose never verifies as another.
///
/// ## Security Design
///
/// - **HS256 ONLY**: the validator pins the algorithm, no `alg` negotiation
/// - **Distinct keys**: access and refresh tokens are signed with different secrets
/// - **Typed tokens**: parsing checks `token_type` against the expected class
/// - **No leeway**: an expired token is rejected the second it expires
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::{JwtCodec, TokenIssuer, TokenKind, TokenParser};
/// use std::time::Duration;
///
/// let codec = JwtCodec::new(
///     b"access-secret-access-secret-access-secret",
///     b"refresh-secret-refresh-secret-refresh-secret",
/// )
/// .expect("valid secrets");
///
/// let token = codec
///     .issue(TokenKind::Access, "user-1", Duration::from_secs(900), None)
///     .expect("token issued");
/// let claims = codec.parse(TokenKind::Access, &token).expect("token valid");
/// assert_eq!(claims.sub, "user-1");
/// ```
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// JWT algorithm - pinned for issuance and validation
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Minimum secret length in bytes (256 bits for HS256)
pub const MIN_SECRET_LENGTH: usize = 32;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature mismatch, malformed structure, wrong token class or expiry
    #[error("Token validation failed: {0}")]
    Invalid(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Invalid signing secret: {0}")]
    WeakSecret(String),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Token class, each bound to a signing secret and a `token_type` claim value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    Verification,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Verification => "verification",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access", "refresh" or "verification"
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    /// Lifetime the token was issued with
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.exp.saturating_sub(self.iat).max(0) as u64)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Signs tokens binding a subject to an expiry
pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        kind: TokenKind,
        subject: &str,
        ttl: Duration,
        role: Option<&str>,
    ) -> Result<String, TokenError>;
}

/// Verifies tokens and recovers their claims without a server-side lookup
pub trait TokenParser: Send + Sync {
    fn parse(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError>;
}

// ============================================================================
// HS256 implementation
// ============================================================================

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256 token codec holding one key pair per secret
pub struct JwtCodec {
    access: KeyPair,
    refresh: KeyPair,
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("algorithm", &JWT_ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl JwtCodec {
    /// Build a codec from the access and refresh secrets
    ///
    /// ## Errors
    ///
    /// Returns `TokenError::WeakSecret` if either secret is shorter than
    /// `MIN_SECRET_LENGTH` bytes or both secrets are identical.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, TokenError> {
        if access_secret.len() < MIN_SECRET_LENGTH {
            return Err(TokenError::WeakSecret(format!(
                "access secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if refresh_secret.len() < MIN_SECRET_LENGTH {
            return Err(TokenError::WeakSecret(format!(
                "refresh secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if access_secret == refresh_secret {
            return Err(TokenError::WeakSecret(
                "access and refresh secrets must differ".to_string(),
            ));
        }

        Ok(Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access | TokenKind::Verification => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

impl TokenIssuer for JwtCodec {
    fn issue(
        &self,
        kind: TokenKind,
        subject: &str,
        ttl: Duration,
        role: Option<&str>,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Signing(format!("ttl out of range: {ttl:?}")))?;
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
            token_type: kind.as_str().to_string(),
            role: role.map(str::to_string),
        };

        encode(
            &Header::new(JWT_ALGORITHM),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| TokenError::Signing(format!("failed to generate {kind} token: {e}")))
    }
}

impl TokenParser for JwtCodec {
    fn parse(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.token_type != kind.as_str() {
            return Err(TokenError::Invalid(format!(
                "expected {kind} token, got {}",
                data.claims.token_type
            )));
        }

        Ok(data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"test-access-secret-min-32-chars-long!!";
    const REFRESH_SECRET: &[u8] = b"test-refresh-secret-min-32-chars-long!";

    fn codec() -> JwtCodec {
        JwtCodec::new(ACCESS_SECRET, REFRESH_SECRET).expect("test secrets are valid")
    }

    #[test]
    fn test_issue_produces_three_part_jwt() {
        let token = codec()
            .issue(TokenKind::Access, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        assert_eq!(token.matches('.').count(), 2);
    }

    #[test]
    fn test_parse_returns_issued_claims() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "user-1", Duration::from_secs(900), Some("member"))
            .expect("should issue token");

        let claims = codec.parse(TokenKind::Access, &token).expect("should parse");

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.ttl(), Duration::from_secs(900));
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.role.as_deref(), Some("member"));
    }

    #[test]
    fn test_role_is_omitted_when_absent() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Refresh, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        let claims = codec.parse(TokenKind::Refresh, &token).expect("should parse");
        assert!(claims.role.is_none());
    }

    #[test]
    fn test_refresh_token_rejected_as_access_token() {
        let codec = codec();
        let refresh = codec
            .issue(TokenKind::Refresh, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        assert!(matches!(
            codec.parse(TokenKind::Access, &refresh),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_access_token_rejected_as_refresh_token() {
        let codec = codec();
        let access = codec
            .issue(TokenKind::Access, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        assert!(codec.parse(TokenKind::Refresh, &access).is_err());
    }

    #[test]
    fn test_verification_token_rejected_as_access_token() {
        let codec = codec();
        let verification = codec
            .issue(TokenKind::Verification, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        assert!(codec.parse(TokenKind::Access, &verification).is_err());
        assert!(codec.parse(TokenKind::Verification, &verification).is_ok());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(codec().parse(TokenKind::Access, "invalid.token.here").is_err());
        assert!(codec().parse(TokenKind::Access, "").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = JwtCodec::new(
            b"another-access-secret-min-32-chars!!!",
            b"another-refresh-secret-min-32-chars!!",
        )
        .expect("valid secrets");
        let token = other
            .issue(TokenKind::Access, "user-1", Duration::from_secs(60), None)
            .expect("should issue token");

        assert!(codec().parse(TokenKind::Access, &token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            JwtCodec::new(b"short", REFRESH_SECRET),
            Err(TokenError::WeakSecret(_))
        ));
        assert!(matches!(
            JwtCodec::new(ACCESS_SECRET, b"short"),
            Err(TokenError::WeakSecret(_))
        ));
    }

    #[test]
    fn test_identical_secrets_rejected() {
        assert!(matches!(
            JwtCodec::new(ACCESS_SECRET, ACCESS_SECRET),
            Err(TokenError::WeakSecret(_))
        ));
    }
}
