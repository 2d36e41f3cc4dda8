/// Identity use cases
///
/// `IdentityService` sequences validation, hashing, persistence and token
/// issuance for every account operation. It depends only on capability
/// traits and never on a web framework; callers pass the resolved caller id
/// and a cancellation token explicitly.
///
/// ## State machine
///
/// `Unregistered -> Pending (active=false) -> Active -> [Deleted]`
use crate::db::UserRepository;
use crate::domain::{Email, ProfilePolicy, User, UserProfile};
use crate::error::{IdentityError, Result};
use crate::security::{IdGenerator, PasswordHasher};
use crate::services::email::EmailSender;
use crate::validators::{normalize_email, normalize_name, NameField};
use crypto_core::jwt::{TokenIssuer, TokenKind, TokenParser};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const VERIFICATION_EMAIL_SUBJECT: &str = "Account Verification";

/// Reload-and-reapply attempts for writes that lose a race
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Validation bounds, token lifetimes and registration policy
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    pub profile: ProfilePolicy,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verification_token_ttl: Duration,
    /// Remove a freshly registered user when the verification email cannot be sent
    pub rollback_on_email_failure: bool,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            profile: ProfilePolicy::default(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(604_800),
            verification_token_ttl: Duration::from_secs(86_400),
            rollback_on_email_failure: true,
        }
    }
}

/// Capabilities the orchestrator is built from
#[derive(Clone)]
pub struct Capabilities {
    pub store: Arc<dyn UserRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub ids: Arc<dyn IdGenerator>,
    pub issuer: Arc<dyn TokenIssuer>,
    pub parser: Arc<dyn TokenParser>,
    pub email: Arc<dyn EmailSender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<PasswordChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    ids: Arc<dyn IdGenerator>,
    issuer: Arc<dyn TokenIssuer>,
    parser: Arc<dyn TokenParser>,
    email: Arc<dyn EmailSender>,
    policy: IdentityPolicy,
}

impl IdentityService {
    pub fn new(caps: Capabilities, policy: IdentityPolicy) -> Self {
        Self {
            store: caps.store,
            hasher: caps.hasher,
            ids: caps.ids,
            issuer: caps.issuer,
            parser: caps.parser,
            email: caps.email,
            policy,
        }
    }

    pub fn policy(&self) -> &IdentityPolicy {
        &self.policy
    }

    /// Register a pending user and send the verification email.
    ///
    /// All input is validated before anything is hashed or stored. If the
    /// verification email cannot be delivered the operation fails; with
    /// `rollback_on_email_failure` the new user is removed first.
    pub async fn register(
        &self,
        req: RegisterRequest,
        cancel: &CancellationToken,
    ) -> Result<UserProfile> {
        let profile = &self.policy.profile;
        let first_name = normalize_name(NameField::First, &req.first_name, profile)?;
        let last_name = normalize_name(NameField::Last, &req.last_name, profile)?;
        let email = normalize_email(&req.email, profile)?;
        profile.check_password(&req.password)?;

        let password_hash = self.hasher.hash(&req.password).await?;
        let id = self.ids.new_id()?;
        let user = User::new(id, &first_name, &last_name, &email, password_hash, profile)?;

        let user = self.store.create(user, cancel).await?;
        info!(user_id = %user.id(), "User registered");

        if let Err(err) = self.send_verification(&user).await {
            warn!(user_id = %user.id(), error = %err, "Verification email failed");
            if self.policy.rollback_on_email_failure {
                self.rollback_registration(&user).await;
            }
            return Err(err);
        }

        Ok(user.profile())
    }

    async fn send_verification(&self, user: &User) -> Result<()> {
        let token = self.issuer.issue(
            TokenKind::Verification,
            user.id(),
            self.policy.verification_token_ttl,
            None,
        )?;
        self.email
            .send_verification(user.email().as_str(), VERIFICATION_EMAIL_SUBJECT, &token)
            .await
    }

    // Runs on its own token: the cleanup must finish even if the request was abandoned
    async fn rollback_registration(&self, user: &User) {
        let cleanup = CancellationToken::new();
        match self
            .store
            .delete_user(user.id(), user.password_hash(), &cleanup)
            .await
        {
            Ok(()) => info!(user_id = %user.id(), "Registration rolled back"),
            Err(e) => warn!(user_id = %user.id(), error = %e, "Registration rollback failed"),
        }
    }

    /// Pending -> Active
    pub async fn activate(&self, user_id: &str, cancel: &CancellationToken) -> Result<()> {
        let mut attempt = 1;
        loop {
            let mut user = self.store.find_by_id(user_id, cancel).await?;
            user.activate()?;

            match self.store.update(user, cancel).await {
                Ok(_) => break,
                Err(IdentityError::ConcurrentModification) if attempt < MAX_UPDATE_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(user_id = %user_id, "User activated");
        Ok(())
    }

    /// Activate the subject of an emailed verification token
    pub async fn activate_with_token(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let claims = self.parser.parse(TokenKind::Verification, token)?;
        self.activate(&claims.sub, cancel).await
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown email and wrong password are indistinguishable. The password is
    /// checked before activation, so `UserNotActive` is only revealed to
    /// holders of the password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<TokenPair> {
        let user = match self.store.find_by_email(email, cancel).await {
            Ok(user) => user,
            Err(IdentityError::UserNotFound) => return Err(IdentityError::InvalidPassword),
            Err(e) => return Err(e),
        };

        self.hasher.verify(user.password_hash(), password).await?;

        if !user.is_active() {
            return Err(IdentityError::UserNotActive);
        }

        let access_token = self.issuer.issue(
            TokenKind::Access,
            user.id(),
            self.policy.access_token_ttl,
            None,
        )?;
        let refresh_token = self.issuer.issue(
            TokenKind::Refresh,
            user.id(),
            self.policy.refresh_token_ttl,
            None,
        )?;

        self.store
            .add_session(user.id(), &refresh_token, cancel)
            .await?;

        info!(user_id = %user.id(), "User logged in");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a new access token for an active refresh token
    pub async fn refresh(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<String> {
        let claims = self.parser.parse(TokenKind::Refresh, refresh_token)?;

        if !self
            .store
            .has_session(&claims.sub, refresh_token, cancel)
            .await?
        {
            return Err(IdentityError::TokenInvalid);
        }

        let access_token = self.issuer.issue(
            TokenKind::Access,
            &claims.sub,
            self.policy.access_token_ttl,
            claims.role.as_deref(),
        )?;
        Ok(access_token)
    }

    /// Close one session. Idempotent.
    pub async fn logout(
        &self,
        user_id: &str,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.store.logout(user_id, refresh_token, cancel).await?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Remove the account after re-verifying its password
    pub async fn delete(
        &self,
        user_id: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let user = self.store.find_by_id(user_id, cancel).await?;
        self.hasher.verify(user.password_hash(), password).await?;

        // The store re-checks the verified hash, so a concurrent password
        // change turns this into InvalidPassword.
        self.store
            .delete_user(user_id, user.password_hash(), cancel)
            .await?;

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Apply the present fields of `patch`, each validated like registration.
    ///
    /// The patch is applied to a fresh copy of the user. If another write
    /// lands first, the user is reloaded and the patch reapplied, including
    /// the current-password check against the newer hash.
    pub async fn update_profile(
        &self,
        user_id: &str,
        patch: ProfileUpdate,
        cancel: &CancellationToken,
    ) -> Result<UserProfile> {
        let profile = &self.policy.profile;
        let email = patch
            .email
            .as_deref()
            .map(|raw| Email::parse(raw, profile))
            .transpose()?;

        if let Some(change) = &patch.password {
            profile.check_password(&change.new_password)?;
            if let Some(confirm) = &change.confirm_password {
                if confirm != &change.new_password {
                    return Err(IdentityError::PasswordConfirmationMismatch);
                }
            }
        }

        let mut new_hash = None;
        let mut attempt = 1;
        loop {
            let mut user = self.store.find_by_id(user_id, cancel).await?;

            if let Some(first_name) = &patch.first_name {
                user.set_first_name(first_name, profile)?;
            }
            if let Some(last_name) = &patch.last_name {
                user.set_last_name(last_name, profile)?;
            }
            if let Some(email) = &email {
                user.set_email(email.clone());
            }

            if let Some(change) = &patch.password {
                self.hasher
                    .verify(user.password_hash(), &change.current_password)
                    .await?;
                if new_hash.is_none() {
                    new_hash = Some(self.hasher.hash(&change.new_password).await?);
                }
                if let Some(password_hash) = &new_hash {
                    user.set_password_hash(password_hash.clone());
                }
            }

            match self.store.update(user, cancel).await {
                Ok(user) => {
                    info!(user_id = %user_id, "Profile updated");
                    return Ok(user.profile());
                }
                Err(IdentityError::ConcurrentModification) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(user_id = %user_id, attempt, "Profile changed underneath update, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.policy.profile.check_password(new_password)?;
        let password_hash = self.hasher.hash(new_password).await?;
        self.store
            .change_password(user_id, password_hash, cancel)
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn change_email(
        &self,
        user_id: &str,
        new_email: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let email = Email::parse(new_email, &self.policy.profile)?;
        self.store.change_email(user_id, email, cancel).await?;

        info!(user_id = %user_id, "Email changed");
        Ok(())
    }

    /// Signal reset eligibility for a known email
    pub async fn reset_password(&self, email: &str, cancel: &CancellationToken) -> Result<()> {
        let user = self.store.find_by_email(email, cancel).await?;
        info!(user_id = %user.id(), "Password reset requested");
        Ok(())
    }

    pub async fn profile(&self, user_id: &str, cancel: &CancellationToken) -> Result<UserProfile> {
        let user = self.store.find_by_id(user_id, cancel).await?;
        Ok(user.profile())
    }
}
