//! Configuration management for Identity Service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("listening on port {}", settings.server.port);
//!     Ok(())
//! }
//! ```

use crate::domain::ProfilePolicy;
use crate::services::IdentityPolicy;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Minimum JWT secret length in bytes
const MIN_SECRET_BYTES: usize = crypto_core::jwt::MIN_SECRET_LENGTH;

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {key}"))
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub jwt: JwtSettings,
    pub policy: PolicySettings,
    pub email: EmailSettings,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// In debug builds a `.env` file is read first.
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            server: ServerSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            policy: PolicySettings::from_env()?,
            email: EmailSettings::from_env()?,
        })
    }

    /// Policy handed to the identity orchestrator
    pub fn identity_policy(&self) -> IdentityPolicy {
        IdentityPolicy {
            profile: ProfilePolicy {
                name_min_length: self.policy.name_min_length,
                name_max_length: self.policy.name_max_length,
                email_max_length: self.policy.email_max_length,
                password_min_length: self.policy.password_min_length,
            },
            access_token_ttl: Duration::from_secs(self.jwt.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(self.jwt.refresh_token_ttl_secs),
            verification_token_ttl: Duration::from_secs(self.jwt.verify_token_ttl_secs),
            rollback_on_email_failure: self.policy.rollback_on_email_failure,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", "8080")?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "10")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// JWT signing settings (HS256, one secret per token class)
#[derive(Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub verify_token_ttl_secs: u64,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("verify_token_ttl_secs", &self.verify_token_ttl_secs)
            .finish()
    }
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let access_secret = env::var("ACCESS_SECRET").context("ACCESS_SECRET must be set")?;
        let refresh_secret = env::var("REFRESH_SECRET").context("REFRESH_SECRET must be set")?;

        ensure!(
            access_secret.len() >= MIN_SECRET_BYTES,
            "ACCESS_SECRET must be at least {MIN_SECRET_BYTES} bytes"
        );
        ensure!(
            refresh_secret.len() >= MIN_SECRET_BYTES,
            "REFRESH_SECRET must be at least {MIN_SECRET_BYTES} bytes"
        );
        ensure!(
            access_secret != refresh_secret,
            "ACCESS_SECRET and REFRESH_SECRET must differ"
        );

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_ttl_secs: parse_env("ACCESS_TOKEN_EXPIRE", "900")?,
            refresh_token_ttl_secs: parse_env("REFRESH_TOKEN_EXPIRE", "604800")?,
            verify_token_ttl_secs: parse_env("VERIFY_TOKEN_EXPIRE", "86400")?,
        })
    }
}

/// Validation bounds and registration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    pub name_min_length: usize,
    pub name_max_length: usize,
    pub email_max_length: usize,
    pub password_min_length: usize,
    pub rollback_on_email_failure: bool,
}

impl PolicySettings {
    fn from_env() -> Result<Self> {
        let settings = Self {
            name_min_length: parse_env("NAME_MIN_LENGTH", "1")?,
            name_max_length: parse_env("NAME_MAX_LENGTH", "100")?,
            email_max_length: parse_env("EMAIL_MAX_LENGTH", "256")?,
            password_min_length: parse_env("PASSWORD_MIN_LENGTH", "8")?,
            rollback_on_email_failure: parse_env("ROLLBACK_ON_EMAIL_FAILURE", "true")?,
        };

        ensure!(
            settings.name_min_length >= 1,
            "NAME_MIN_LENGTH must be at least 1"
        );
        ensure!(
            settings.name_min_length <= settings.name_max_length,
            "NAME_MIN_LENGTH must not exceed NAME_MAX_LENGTH"
        );

        Ok(settings)
    }
}

/// Email service configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub use_starttls: bool,
    pub verification_base_url: Option<String>,
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "<redacted>"))
            .field("smtp_from", &self.smtp_from)
            .field("use_starttls", &self.use_starttls)
            .field("verification_base_url", &self.verification_base_url)
            .finish()
    }
}

impl EmailSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            smtp_host: env::var("SMTP_SERVER").unwrap_or_default(),
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@nova.dev".to_string()),
            use_starttls: env::var("SMTP_USE_STARTTLS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            verification_base_url: env::var("EMAIL_VERIFICATION_BASE_URL").ok(),
        })
    }
}
