/// User identifier generation
use crate::error::Result;
use uuid::Uuid;

/// Produces globally unique, never reused user identifiers
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Result<String>;
}

/// Random UUID v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }
}
