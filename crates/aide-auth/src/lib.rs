//! Identity provider interface for aide
//!
//! The core never talks to the identity provider directly except to read the
//! display name for the greeting; everything else (forms, navigation) is
//! presentation. Errors surface as display strings and are never fatal.

pub mod memory;

pub use memory::InMemoryAuthGateway;

use aide_foundation::AuthError;
use async_trait::async_trait;

/// An authenticated identity context returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Session {
    /// Display name for greeting text, `"User"` when absent.
    pub fn display_name_or_default(&self) -> &str {
        self.display_name.as_deref().unwrap_or("User")
    }
}

/// Identity session issuance and queries.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn current_session(&self) -> Option<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(&self, name: &str, email: &str, password: &str)
        -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
}
