//! Test fixtures and helpers for identity-service tests
#![allow(dead_code)]

use async_trait::async_trait;
use crypto_core::jwt::JwtCodec;
use identity_service::{
    db::InMemoryUserStore,
    security::{Argon2PasswordHasher, UuidGenerator},
    services::{Capabilities, EmailSender, IdentityPolicy, IdentityService, RegisterRequest},
    IdentityError, Result,
};
use std::sync::{Arc, Mutex};

/// Standard test user
pub const TEST_FIRST_NAME: &str = "Max";
pub const TEST_LAST_NAME: &str = "Mustermann";
pub const TEST_EMAIL: &str = "max@x.com";
pub const TEST_PASSWORD: &str = "password1";

pub const ACCESS_SECRET: &[u8] = b"integration-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-0123456789abcdef";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub token: String,
}

/// Email sender that records every message, optionally failing instead
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl RecordingEmailSender {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("email log poisoned").clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.sent().last().map(|m| m.token.clone())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_verification(&self, to: &str, subject: &str, token: &str) -> Result<()> {
        if self.fail {
            return Err(IdentityError::EmailDelivery("mailbox unavailable".to_string()));
        }
        self.sent.lock().expect("email log poisoned").push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

/// Everything a test needs to drive and inspect the orchestrator
pub struct TestContext {
    pub service: Arc<IdentityService>,
    pub store: Arc<InMemoryUserStore>,
    pub email: Arc<RecordingEmailSender>,
    pub codec: Arc<JwtCodec>,
}

pub fn codec() -> Arc<JwtCodec> {
    Arc::new(JwtCodec::new(ACCESS_SECRET, REFRESH_SECRET).expect("valid test secrets"))
}

pub fn context_with(email: RecordingEmailSender, policy: IdentityPolicy) -> TestContext {
    let store = Arc::new(InMemoryUserStore::new());
    let email = Arc::new(email);
    let codec = codec();

    let service = Arc::new(IdentityService::new(
        Capabilities {
            store: store.clone(),
            hasher: Arc::new(Argon2PasswordHasher),
            ids: Arc::new(UuidGenerator),
            issuer: codec.clone(),
            parser: codec.clone(),
            email: email.clone(),
        },
        policy,
    ));

    TestContext {
        service,
        store,
        email,
        codec,
    }
}

pub fn context() -> TestContext {
    context_with(RecordingEmailSender::default(), IdentityPolicy::default())
}

/// Create a valid RegisterRequest for testing
pub fn valid_register_request() -> RegisterRequest {
    custom_register_request(TEST_EMAIL, TEST_PASSWORD)
}

/// Create a RegisterRequest with custom email and password
pub fn custom_register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: TEST_FIRST_NAME.to_string(),
        last_name: TEST_LAST_NAME.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// Invalid email formats for testing
pub fn invalid_emails() -> Vec<&'static str> {
    vec![
        "not-an-email",      // Missing @
        "@example.com",      // Missing local part
        "test@",             // Missing domain
        "test @example.com", // Space in email
        "test@example",      // Missing TLD
    ]
}
