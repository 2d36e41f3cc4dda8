//! Input validation utilities for identity service

use crate::domain::ProfilePolicy;
use crate::error::{IdentityError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// Compile regex patterns once at startup
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

/// Validate email format (`local@domain.tld`, RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_REGEX.is_match(email)
}

/// Trim and lowercase an email, then check length and format.
pub fn normalize_email(raw: &str, policy: &ProfilePolicy) -> Result<String> {
    let email = raw.trim().to_ascii_lowercase();

    if email.chars().count() > policy.email_max_length {
        return Err(IdentityError::EmailTooLong {
            max: policy.email_max_length,
        });
    }
    if !validate_email(&email) {
        return Err(IdentityError::InvalidEmail);
    }

    Ok(email)
}

/// Which name field is being validated, so errors name the right one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    First,
    Last,
}

/// Trim a name and check it against the policy bounds.
pub fn normalize_name(field: NameField, raw: &str, policy: &ProfilePolicy) -> Result<String> {
    let name = raw.trim();
    let len = name.chars().count();
    let (min, max) = (policy.name_min_length, policy.name_max_length);

    let err = match field {
        NameField::First if len == 0 => IdentityError::EmptyFirstName,
        NameField::Last if len == 0 => IdentityError::EmptyLastName,
        NameField::First if len < min => IdentityError::FirstNameTooShort { min },
        NameField::Last if len < min => IdentityError::LastNameTooShort { min },
        NameField::First if len > max => IdentityError::FirstNameTooLong { max },
        NameField::Last if len > max => IdentityError::LastNameTooLong { max },
        _ => return Ok(name.to_string()),
    };

    Err(err)
}

/// Check a cleartext password against the minimum length
pub fn validate_password(password: &str, policy: &ProfilePolicy) -> Result<()> {
    if password.chars().count() < policy.password_min_length {
        return Err(IdentityError::PasswordTooShort {
            min: policy.password_min_length,
        });
    }
    Ok(())
}
