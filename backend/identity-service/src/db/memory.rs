/// In-memory user store
///
/// Users, the email index and the session index live behind one
/// `tokio::sync::RwLock`. Every logical operation takes the lock exactly once,
/// so index updates are never observable half-done.
use super::UserRepository;
use crate::domain::{Email, HashedPassword, User};
use crate::error::{IdentityError, Result};
use async_trait::async_trait;
use crypto_core::hash::sha256_hex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct StoreInner {
    users: HashMap<String, User>,
    /// normalized email -> user id
    email_index: HashMap<String, String>,
    /// user id -> SHA-256 digests of active refresh tokens
    sessions: HashMap<String, HashSet<String>>,
}

impl StoreInner {
    fn repoint_email(&mut self, user_id: &str, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if let Some(owner) = self.email_index.get(new) {
            if owner != user_id {
                return Err(IdentityError::EmailAlreadyExists);
            }
        }
        self.email_index.remove(old);
        self.email_index
            .insert(new.to_string(), user_id.to_string());
        Ok(())
    }
}

fn normalize_lookup(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Single-process authoritative user store
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<RwLockReadGuard<'_, StoreInner>> {
        if cancel.is_cancelled() {
            return Err(IdentityError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IdentityError::Cancelled),
            guard = self.inner.read() => Ok(guard),
        }
    }

    async fn write(&self, cancel: &CancellationToken) -> Result<RwLockWriteGuard<'_, StoreInner>> {
        if cancel.is_cancelled() {
            return Err(IdentityError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IdentityError::Cancelled),
            guard = self.inner.write() => Ok(guard),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn create(&self, user: User, cancel: &CancellationToken) -> Result<User> {
        let mut inner = self.write(cancel).await?;

        if inner.email_index.contains_key(user.email().as_str()) {
            return Err(IdentityError::EmailAlreadyExists);
        }
        if inner.users.contains_key(user.id()) {
            tracing::error!(user_id = %user.id(), "Generated user id collided with existing user");
            return Err(IdentityError::UserIdAlreadyExists);
        }

        inner
            .email_index
            .insert(user.email().as_str().to_string(), user.id().to_string());
        inner.users.insert(user.id().to_string(), user.clone());

        tracing::debug!(user_id = %user.id(), "User stored");
        Ok(user)
    }

    async fn find_by_email(&self, email: &str, cancel: &CancellationToken) -> Result<User> {
        let inner = self.read(cancel).await?;
        inner
            .email_index
            .get(&normalize_lookup(email))
            .and_then(|id| inner.users.get(id))
            .cloned()
            .ok_or(IdentityError::UserNotFound)
    }

    async fn find_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<User> {
        let inner = self.read(cancel).await?;
        inner
            .users
            .get(id)
            .cloned()
            .ok_or(IdentityError::UserNotFound)
    }

    async fn update(&self, mut user: User, cancel: &CancellationToken) -> Result<User> {
        let mut inner = self.write(cancel).await?;

        let (old_email, stored_version) = inner
            .users
            .get(user.id())
            .map(|existing| (existing.email().as_str().to_string(), existing.version()))
            .ok_or(IdentityError::UserNotFound)?;

        if stored_version != user.version() {
            tracing::debug!(user_id = %user.id(), "Rejected update from stale snapshot");
            return Err(IdentityError::ConcurrentModification);
        }

        inner.repoint_email(user.id(), &old_email, user.email().as_str())?;
        user.bump_version();
        inner.users.insert(user.id().to_string(), user.clone());

        tracing::debug!(user_id = %user.id(), "User updated");
        Ok(user)
    }

    async fn delete_user(
        &self,
        id: &str,
        expected_hash: &HashedPassword,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut inner = self.write(cancel).await?;

        let stored = inner.users.get(id).ok_or(IdentityError::UserNotFound)?;
        let matches: bool = stored
            .password_hash()
            .as_bytes()
            .ct_eq(expected_hash.as_bytes())
            .into();
        if !matches {
            return Err(IdentityError::InvalidPassword);
        }

        let email = stored.email().as_str().to_string();
        inner.users.remove(id);
        inner.email_index.remove(&email);
        inner.sessions.remove(id);

        tracing::debug!(user_id = %id, "User removed");
        Ok(())
    }

    async fn add_session(
        &self,
        user_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut inner = self.write(cancel).await?;

        if !inner.users.contains_key(user_id) {
            return Err(IdentityError::UserNotFound);
        }
        inner
            .sessions
            .entry(user_id.to_string())
            .or_default()
            .insert(sha256_hex(token));
        Ok(())
    }

    async fn has_session(
        &self,
        user_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let inner = self.read(cancel).await?;
        Ok(inner
            .sessions
            .get(user_id)
            .is_some_and(|set| set.contains(&sha256_hex(token))))
    }

    async fn logout(&self, user_id: &str, token: &str, cancel: &CancellationToken) -> Result<()> {
        let mut inner = self.write(cancel).await?;

        if let Some(set) = inner.sessions.get_mut(user_id) {
            set.remove(&sha256_hex(token));
            if set.is_empty() {
                inner.sessions.remove(user_id);
            }
        }
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: &str,
        password_hash: HashedPassword,
        cancel: &CancellationToken,
    ) -> Result<User> {
        let mut inner = self.write(cancel).await?;

        let user = inner
            .users
            .get_mut(user_id)
            .ok_or(IdentityError::UserNotFound)?;
        user.set_password_hash(password_hash);
        user.bump_version();
        Ok(user.clone())
    }

    async fn change_email(
        &self,
        user_id: &str,
        email: Email,
        cancel: &CancellationToken,
    ) -> Result<User> {
        let mut inner = self.write(cancel).await?;

        let old_email = inner
            .users
            .get(user_id)
            .map(|existing| existing.email().as_str().to_string())
            .ok_or(IdentityError::UserNotFound)?;

        inner.repoint_email(user_id, &old_email, email.as_str())?;

        let user = inner
            .users
            .get_mut(user_id)
            .ok_or(IdentityError::UserNotFound)?;
        user.set_email(email);
        user.bump_version();
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfilePolicy;
    use std::time::Duration;

    fn hash(tag: &str) -> HashedPassword {
        HashedPassword::from_phc(format!("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA${tag}"))
            .expect("non-empty")
    }

    fn user(id: &str, email: &str) -> User {
        User::new(id, "Max", "Mustermann", email, hash(id), &ProfilePolicy::default())
            .expect("valid user")
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();

        store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let by_email = store
            .find_by_email("  MAX@x.com", &cancel)
            .await
            .expect("found by email");
        let by_id = store.find_by_id("u1", &cancel).await.expect("found by id");
        assert_eq!(by_email.id(), "u1");
        assert_eq!(by_id.email().as_str(), "max@x.com");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email_and_id() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let dup_email = store.create(user("u2", "max@x.com"), &cancel).await;
        assert!(matches!(dup_email, Err(IdentityError::EmailAlreadyExists)));

        let dup_id = store.create(user("u1", "other@x.com"), &cancel).await;
        assert!(matches!(dup_id, Err(IdentityError::UserIdAlreadyExists)));

        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_user() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        assert!(matches!(
            store.find_by_id("nope", &cancel).await,
            Err(IdentityError::UserNotFound)
        ));
        assert!(matches!(
            store.find_by_email("nope@x.com", &cancel).await,
            Err(IdentityError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_repoints_email_index() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        let mut stored = store
            .create(user("u1", "a@x.com"), &cancel)
            .await
            .expect("create succeeds");

        stored.set_email(Email::parse("b@x.com", &ProfilePolicy::default()).expect("valid"));
        store.update(stored, &cancel).await.expect("update succeeds");

        assert!(matches!(
            store.find_by_email("a@x.com", &cancel).await,
            Err(IdentityError::UserNotFound)
        ));
        let found = store
            .find_by_email("b@x.com", &cancel)
            .await
            .expect("new email indexed");
        assert_eq!(found.id(), "u1");
    }

    #[tokio::test]
    async fn test_update_rejects_email_owned_by_other_user() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "a@x.com"), &cancel)
            .await
            .expect("create succeeds");
        store
            .create(user("u2", "b@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let result = store
            .change_email(
                "u2",
                Email::parse("a@x.com", &ProfilePolicy::default()).expect("valid"),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(IdentityError::EmailAlreadyExists)));

        let still = store.find_by_email("b@x.com", &cancel).await.expect("unchanged");
        assert_eq!(still.id(), "u2");
    }

    #[tokio::test]
    async fn test_update_rejects_stale_snapshot() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "a@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let mut stale = store.find_by_id("u1", &cancel).await.expect("found");
        store
            .change_password("u1", hash("new"), &cancel)
            .await
            .expect("change succeeds");

        stale
            .set_first_name("Moritz", &ProfilePolicy::default())
            .expect("valid name");
        let result = store.update(stale, &cancel).await;
        assert!(matches!(result, Err(IdentityError::ConcurrentModification)));

        let stored = store.find_by_id("u1", &cancel).await.expect("found");
        assert_eq!(stored.password_hash(), &hash("new"));
        assert_eq!(stored.first_name(), "Max");
    }

    #[tokio::test]
    async fn test_second_writer_of_same_snapshot_loses() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "a@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let mut first = store.find_by_id("u1", &cancel).await.expect("found");
        let mut second = first.clone();

        first.activate().expect("pending user");
        let committed = store.update(first, &cancel).await.expect("first write wins");
        assert_eq!(committed.version(), 1);

        second
            .set_last_name("Muster", &ProfilePolicy::default())
            .expect("valid name");
        assert!(matches!(
            store.update(second, &cancel).await,
            Err(IdentityError::ConcurrentModification)
        ));
        assert!(store.find_by_id("u1", &cancel).await.expect("found").is_active());
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        let result = store.update(user("ghost", "g@x.com"), &cancel).await;
        assert!(matches!(result, Err(IdentityError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_delete_requires_matching_hash() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");
        store
            .add_session("u1", "refresh-token", &cancel)
            .await
            .expect("session added");

        let wrong = store.delete_user("u1", &hash("other"), &cancel).await;
        assert!(matches!(wrong, Err(IdentityError::InvalidPassword)));
        assert!(store.find_by_id("u1", &cancel).await.is_ok());

        store
            .delete_user("u1", &hash("u1"), &cancel)
            .await
            .expect("delete succeeds");
        assert!(store.find_by_id("u1", &cancel).await.is_err());
        assert!(store.find_by_email("max@x.com", &cancel).await.is_err());
        assert!(!store
            .has_session("u1", "refresh-token", &cancel)
            .await
            .expect("lookup succeeds"));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");
        store.add_session("u1", "t1", &cancel).await.expect("added");
        store.add_session("u1", "t2", &cancel).await.expect("added");

        store.logout("u1", "t1", &cancel).await.expect("first logout");
        store.logout("u1", "t1", &cancel).await.expect("second logout");
        store.logout("ghost", "t1", &cancel).await.expect("unknown user");

        assert!(!store.has_session("u1", "t1", &cancel).await.expect("lookup"));
        assert!(store.has_session("u1", "t2", &cancel).await.expect("lookup"));
    }

    #[tokio::test]
    async fn test_session_tokens_are_stored_as_digests() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");
        store
            .add_session("u1", "raw-refresh-token", &cancel)
            .await
            .expect("added");

        let inner = store.inner.read().await;
        let set = inner.sessions.get("u1").expect("session set");
        assert!(!set.contains("raw-refresh-token"));
        assert!(set.contains(&sha256_hex("raw-refresh-token")));
    }

    #[tokio::test]
    async fn test_change_password_replaces_hash() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        let created = store
            .create(user("u1", "max@x.com"), &cancel)
            .await
            .expect("create succeeds");

        let updated = store
            .change_password("u1", hash("new"), &cancel)
            .await
            .expect("change succeeds");
        assert_eq!(updated.password_hash(), &hash("new"));
        assert!(updated.updated_at() > created.updated_at());
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_without_mutation() {
        let store = InMemoryUserStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = store.create(user("u1", "max@x.com"), &cancel).await;
        assert!(matches!(result, Err(IdentityError::Cancelled)));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_lock() {
        let store = InMemoryUserStore::new();
        let guard = store.inner.write().await;

        let cancel = CancellationToken::new();
        let waiter = {
            let store = store.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { store.create(user("u1", "max@x.com"), &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = waiter.await.expect("task completes");
        assert!(matches!(result, Err(IdentityError::Cancelled)));

        drop(guard);
        assert_eq!(store.user_count().await, 0);
    }
}
