/// User storage for identity service
///
/// `UserRepository` is the authoritative-store contract the orchestrator
/// depends on. `InMemoryUserStore` is the single-process implementation;
/// a durable backend implements the same trait.
use crate::domain::{Email, HashedPassword, User};
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod memory;

pub use memory::InMemoryUserStore;

/// Concurrency-safe store of users keyed by id and by email, plus the set of
/// active refresh tokens per user.
///
/// Every method observes `cancel` and returns `IdentityError::Cancelled`
/// without mutating anything if it fires before the operation takes effect.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// Fails with `EmailAlreadyExists` or `UserIdAlreadyExists`.
    async fn create(&self, user: User, cancel: &CancellationToken) -> Result<User>;

    async fn find_by_email(&self, email: &str, cancel: &CancellationToken) -> Result<User>;

    async fn find_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<User>;

    /// Replace a stored user, repointing the email index when the email changed.
    ///
    /// `user` must carry the version it was read at. If the stored user has
    /// been written since, nothing changes and `ConcurrentModification` is
    /// returned; reload and reapply to retry.
    async fn update(&self, user: User, cancel: &CancellationToken) -> Result<User>;

    /// Remove a user and all its sessions if its stored hash still equals
    /// `expected_hash`; otherwise `InvalidPassword`.
    async fn delete_user(
        &self,
        id: &str,
        expected_hash: &HashedPassword,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Record a refresh token as an active session
    async fn add_session(
        &self,
        user_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn has_session(
        &self,
        user_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Remove one refresh token. Unknown users and tokens are a no-op.
    async fn logout(&self, user_id: &str, token: &str, cancel: &CancellationToken) -> Result<()>;

    async fn change_password(
        &self,
        user_id: &str,
        password_hash: HashedPassword,
        cancel: &CancellationToken,
    ) -> Result<User>;

    async fn change_email(
        &self,
        user_id: &str,
        email: Email,
        cancel: &CancellationToken,
    ) -> Result<User>;
}
