/// Service layer for identity-service
///
/// - Identity orchestrator (register, activate, login, sessions, profile changes)
/// - Email service (SMTP delivery of verification tokens)
pub mod email;
pub mod identity;

pub use email::{EmailSender, EmailService};
pub use identity::{
    Capabilities, IdentityPolicy, IdentityService, PasswordChange, ProfileUpdate,
    RegisterRequest, TokenPair, VERIFICATION_EMAIL_SUBJECT,
};
