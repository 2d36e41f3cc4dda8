use crypto_core::TokenError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Coarse error classes used to derive transport status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Credential,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    // Validation
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Email must be at most {max} characters")]
    EmailTooLong { max: usize },

    #[error("First name must not be empty")]
    EmptyFirstName,

    #[error("Last name must not be empty")]
    EmptyLastName,

    #[error("First name must be at least {min} characters")]
    FirstNameTooShort { min: usize },

    #[error("First name must be at most {max} characters")]
    FirstNameTooLong { max: usize },

    #[error("Last name must be at least {min} characters")]
    LastNameTooShort { min: usize },

    #[error("Last name must be at most {max} characters")]
    LastNameTooLong { max: usize },

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Password confirmation does not match")]
    PasswordConfirmationMismatch,

    // Conflict
    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("User id already exists")]
    UserIdAlreadyExists,

    #[error("User already activated")]
    UserAlreadyActivated,

    #[error("User was modified concurrently")]
    ConcurrentModification,

    // Not found
    #[error("User not found")]
    UserNotFound,

    // Credential
    #[error("User not active")]
    UserNotActive,

    #[error("Invalid credentials")]
    InvalidPassword,

    #[error("Invalid or expired token")]
    TokenInvalid,

    // Infrastructure
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Password hashing failed: {0}")]
    PasswordHashing(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::InvalidEmail
            | IdentityError::EmailTooLong { .. }
            | IdentityError::EmptyFirstName
            | IdentityError::EmptyLastName
            | IdentityError::FirstNameTooShort { .. }
            | IdentityError::FirstNameTooLong { .. }
            | IdentityError::LastNameTooShort { .. }
            | IdentityError::LastNameTooLong { .. }
            | IdentityError::PasswordTooShort { .. }
            | IdentityError::PasswordConfirmationMismatch => ErrorKind::Validation,

            IdentityError::EmailAlreadyExists
            | IdentityError::UserIdAlreadyExists
            | IdentityError::UserAlreadyActivated
            | IdentityError::ConcurrentModification => ErrorKind::Conflict,

            IdentityError::UserNotFound => ErrorKind::NotFound,

            IdentityError::UserNotActive
            | IdentityError::InvalidPassword
            | IdentityError::TokenInvalid => ErrorKind::Credential,

            IdentityError::Cancelled
            | IdentityError::PasswordHashing(_)
            | IdentityError::TokenSigning(_)
            | IdentityError::EmailDelivery(_)
            | IdentityError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// HTTP status equivalent of this error
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::UserNotActive => 403,
            IdentityError::Cancelled => 503,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::Conflict => 409,
                ErrorKind::NotFound => 404,
                ErrorKind::Credential => 401,
                ErrorKind::Infrastructure => 500,
            },
        }
    }

    /// Message safe to return to clients.
    ///
    /// Infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Infrastructure => match self {
                IdentityError::Cancelled => "Request cancelled".to_string(),
                _ => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(msg) => {
                tracing::debug!("Token rejected: {}", msg);
                IdentityError::TokenInvalid
            }
            TokenError::Signing(msg) | TokenError::WeakSecret(msg) => {
                tracing::error!("Token signing error: {}", msg);
                IdentityError::TokenSigning(msg)
            }
        }
    }
}
