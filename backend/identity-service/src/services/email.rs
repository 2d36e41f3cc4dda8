/// Email delivery for account verification
use crate::config::EmailSettings;
use crate::error::{IdentityError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Arc;
use tracing::{info, warn};

/// Outbound email capability used by registration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a verification token to `to`
    async fn send_verification(&self, to: &str, subject: &str, token: &str) -> Result<()>;
}

/// Async email transport wrapper (SMTP or no-op)
#[derive(Clone)]
pub struct EmailService {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
    verification_base_url: Option<String>,
}

impl EmailService {
    /// Build email service from configuration
    ///
    /// If SMTP host is empty, operates in no-op mode (logs only).
    /// Useful for development and testing without email infrastructure.
    pub fn new(config: &EmailSettings) -> Result<Self> {
        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .map_err(|e| IdentityError::Internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; email service will operate in no-op mode");
            None
        } else {
            let builder = if config.use_starttls {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            }
            .map_err(|e| {
                IdentityError::Internal(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.smtp_port);

            let builder = if let (Some(username), Some(password)) =
                (&config.smtp_username, &config.smtp_password)
            {
                builder.credentials(Credentials::new(username.to_string(), password.to_string()))
            } else {
                builder
            };

            Some(Arc::new(builder.build()))
        };

        Ok(Self {
            transport,
            from,
            verification_base_url: config.verification_base_url.clone(),
        })
    }

    /// Check if SMTP transport is enabled
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    fn build_verification_link(&self, token: &str) -> Option<String> {
        match &self.verification_base_url {
            Some(base) if !base.is_empty() => Some(format!("{base}?token={token}")),
            _ => None,
        }
    }

    fn verification_body(&self, token: &str) -> String {
        match self.build_verification_link(token) {
            Some(link) => format!(
                "Welcome to Nova!\n\nPlease click the following link to activate your account:\n{}\n\nIf you did not request this, please ignore this email.",
                link
            ),
            None => format!(
                "Welcome to Nova!\n\nUse the following token to activate your account:\n{}\n\nIf you did not request this, please ignore this email.",
                token
            ),
        }
    }

    async fn send_mail(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if let Some(transport) = &self.transport {
            let to = recipient.parse::<Mailbox>().map_err(|e| {
                IdentityError::EmailDelivery(format!("Invalid recipient email address: {}", e))
            })?;

            let email = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(subject)
                .header(header::ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| {
                    IdentityError::EmailDelivery(format!("Failed to build email message: {}", e))
                })?;

            transport
                .send(email)
                .await
                .map_err(|e| IdentityError::EmailDelivery(format!("Failed to send email: {}", e)))?;
            info!(subject, "email sent successfully");
        } else {
            info!(subject, "Email service running in no-op mode; skipping actual send");
        }
        Ok(())
    }
}

#[async_trait]
impl EmailSender for EmailService {
    async fn send_verification(&self, to: &str, subject: &str, token: &str) -> Result<()> {
        let body = self.verification_body(token);
        self.send_mail(to, subject, &body).await
    }
}
