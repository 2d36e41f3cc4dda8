use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IdentityError, Result};
use crate::validators::{normalize_email, normalize_name, validate_password, NameField};

/// Validation bounds for user-supplied profile fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePolicy {
    pub name_min_length: usize,
    pub name_max_length: usize,
    pub email_max_length: usize,
    pub password_min_length: usize,
}

impl Default for ProfilePolicy {
    fn default() -> Self {
        Self {
            name_min_length: 1,
            name_max_length: 100,
            email_max_length: 256,
            password_min_length: 8,
        }
    }
}

impl ProfilePolicy {
    pub fn check_password(&self, cleartext: &str) -> Result<()> {
        validate_password(cleartext, self)
    }
}

/// Normalized, format-checked email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str, policy: &ProfilePolicy) -> Result<Self> {
        normalize_email(raw, policy).map(Email)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PHC-formatted password hash. Only a password hasher produces one.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn from_phc(phc: impl Into<String>) -> Result<Self> {
        let phc = phc.into();
        if phc.is_empty() {
            return Err(IdentityError::PasswordHashing(
                "empty password hash".to_string(),
            ));
        }
        Ok(Self(phc))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(<redacted>)")
    }
}

/// User Aggregate Root
///
/// Identity is the generator-assigned `id`. Names and email are validated on
/// construction and on every change; each mutation advances `updated_at`.
/// Cross-user email uniqueness is enforced by the store, not here.
#[derive(Debug, Clone)]
pub struct User {
    id: String,
    first_name: String,
    last_name: String,
    email: Email,
    password_hash: HashedPassword,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Bumped by the store on every committed write
    version: u64,
}

impl User {
    /// Create a pending (inactive) user
    pub fn new(
        id: impl Into<String>,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: HashedPassword,
        policy: &ProfilePolicy,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::Internal("empty user id".to_string()));
        }

        let first_name = normalize_name(NameField::First, first_name, policy)?;
        let last_name = normalize_name(NameField::Last, last_name, policy)?;
        let email = Email::parse(email, policy)?;
        let now = Utc::now();

        Ok(Self {
            id,
            first_name,
            last_name,
            email,
            password_hash,
            active: false,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn password_hash(&self) -> &HashedPassword {
        &self.password_hash
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Store revision this copy was read at
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn set_first_name(&mut self, first_name: &str, policy: &ProfilePolicy) -> Result<()> {
        self.first_name = normalize_name(NameField::First, first_name, policy)?;
        self.touch();
        Ok(())
    }

    pub fn set_last_name(&mut self, last_name: &str, policy: &ProfilePolicy) -> Result<()> {
        self.last_name = normalize_name(NameField::Last, last_name, policy)?;
        self.touch();
        Ok(())
    }

    pub fn set_email(&mut self, email: Email) {
        self.email = email;
        self.touch();
    }

    pub fn set_password_hash(&mut self, password_hash: HashedPassword) {
        self.password_hash = password_hash;
        self.touch();
    }

    /// Pending -> Active. Happens exactly once.
    pub fn activate(&mut self) -> Result<()> {
        if self.active {
            return Err(IdentityError::UserAlreadyActivated);
        }
        self.active = true;
        self.touch();
        Ok(())
    }

    /// Public view without credential material
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.as_str().to_string(),
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    // updated_at must strictly increase even if the clock has not moved
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

/// Public user profile returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
