/// Password hashing and verification using Argon2id
use crate::domain::HashedPassword;
use crate::error::{IdentityError, Result};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};
use async_trait::async_trait;

/// One-way password hashing capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash a cleartext password
    async fn hash(&self, cleartext: &str) -> Result<HashedPassword>;

    /// Check a cleartext password against a stored hash.
    ///
    /// Returns `IdentityError::InvalidPassword` on mismatch.
    async fn verify(&self, hash: &HashedPassword, cleartext: &str) -> Result<()>;
}

/// Argon2id hasher
///
/// ## Security
///
/// - Algorithm: Argon2id (default configuration)
/// - Salt: Random 16-byte salt generated per password
/// - Verification: constant-time comparison inside `argon2`
///
/// Hashing is CPU-bound and runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordHasher;

fn hash_blocking(password: &str) -> Result<HashedPassword> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::PasswordHashing(e.to_string()))?
        .to_string();

    HashedPassword::from_phc(password_hash)
}

fn verify_blocking(password: &str, password_hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
        IdentityError::PasswordHashing(format!("Invalid password hash format: {}", e))
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(IdentityError::InvalidPassword),
        Err(e) => Err(IdentityError::PasswordHashing(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, cleartext: &str) -> Result<HashedPassword> {
        let password = cleartext.to_string();
        tokio::task::spawn_blocking(move || hash_blocking(&password))
            .await
            .map_err(|e| IdentityError::PasswordHashing(format!("hashing task failed: {}", e)))?
    }

    async fn verify(&self, hash: &HashedPassword, cleartext: &str) -> Result<()> {
        let password = cleartext.to_string();
        let phc = hash.as_str().to_string();
        tokio::task::spawn_blocking(move || verify_blocking(&password, &phc))
            .await
            .map_err(|e| {
                IdentityError::PasswordHashing(format!("verification task failed: {}", e))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify_valid_password() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher
            .hash("password1")
            .await
            .expect("should hash password successfully");

        assert_ne!(hash.as_str(), "password1");
        assert!(hash.as_str().starts_with("$argon2id$"));
        hasher
            .verify(&hash, "password1")
            .await
            .expect("should verify successfully");
    }

    #[tokio::test]
    async fn test_verify_wrong_password() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash("password1").await.expect("should hash");

        let result = hasher.verify(&hash, "wrongpass").await;
        assert!(matches!(result, Err(IdentityError::InvalidPassword)));
    }

    #[tokio::test]
    async fn test_different_hashes_for_same_password() {
        let hasher = Argon2PasswordHasher;
        let hash1 = hasher.hash("password1").await.expect("should hash");
        let hash2 = hasher.hash("password1").await.expect("should hash");
        // Different salts should produce different hashes
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_infrastructure_error() {
        let hasher = Argon2PasswordHasher;
        let bogus = HashedPassword::from_phc("not-a-phc-string").expect("non-empty");

        let result = hasher.verify(&bogus, "password1").await;
        assert!(matches!(result, Err(IdentityError::PasswordHashing(_))));
    }
}
