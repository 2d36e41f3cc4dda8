pub mod user;

// Re-export commonly used types
pub use user::{Email, HashedPassword, ProfilePolicy, User, UserProfile};
