//! ID and token generation.

use ulid::Ulid;
use uuid::Uuid;

/// Generator for string primary keys and session tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lowercase ULID.
    ///
    /// Used for users, groups and follow edges. Posts and comments use
    /// database sequences so that their ids stay short in URLs.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a random session token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // v4 only: tokens must not leak their creation time
        Uuid::new_v4().simple().to_string()
    }
}
