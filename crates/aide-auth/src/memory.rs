//! In-memory auth gateway for the demo shell and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use aide_foundation::AuthError;

use crate::{AuthGateway, Session};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct UserRecord {
    uid: String,
    display_name: Option<String>,
    password: String,
}

/// Stores accounts in process memory. Stands in for a hosted identity
/// provider; nothing survives process exit.
#[derive(Default)]
pub struct InMemoryAuthGateway {
    users: RwLock<HashMap<String, UserRecord>>,
    current: RwLock<Option<Session>>,
    next_uid: AtomicU64,
}

impl InMemoryAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_uid(&self) -> String {
        format!("user-{}", self.next_uid.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

#[async_trait]
impl AuthGateway for InMemoryAuthGateway {
    async fn current_session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let users = self.users.read();
        let record = users.get(email).ok_or(AuthError::InvalidCredentials)?;
        if record.password != password {
            return Err(AuthError::InvalidCredentials);
        }
        let session = Session {
            uid: record.uid.clone(),
            email: email.to_string(),
            display_name: record.display_name.clone(),
        };
        drop(users);
        *self.current.write() = Some(session.clone());
        info!(target: "auth", "Signed in: {}", email);
        Ok(session)
    }

    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        validate_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let mut users = self.users.write();
        if users.contains_key(email) {
            return Err(AuthError::EmailInUse {
                email: email.to_string(),
            });
        }

        let display_name = {
            let trimmed = name.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        let record = UserRecord {
            uid: self.mint_uid(),
            display_name: display_name.clone(),
            password: password.to_string(),
        };
        let session = Session {
            uid: record.uid.clone(),
            email: email.to_string(),
            display_name,
        };
        users.insert(email.to_string(), record);
        drop(users);

        *self.current.write() = Some(session.clone());
        info!(target: "auth", "Account created: {}", email);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.write() = None;
        info!(target: "auth", "Signed out");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        if !self.users.read().contains_key(email) {
            return Err(AuthError::UserNotFound {
                email: email.to_string(),
            });
        }
        info!(target: "auth", "Password reset link sent to {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_creates_session_with_display_name() {
        let gateway = InMemoryAuthGateway::new();
        let session = gateway
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.display_name_or_default(), "Ada");
        assert_eq!(gateway.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn sign_up_blank_name_falls_back_to_default_greeting() {
        let gateway = InMemoryAuthGateway::new();
        let session = gateway
            .sign_up("   ", "anon@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.display_name_or_default(), "User");
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicate_email() {
        let gateway = InMemoryAuthGateway::new();
        gateway
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        let err = gateway
            .sign_up("Ada2", "ada@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailInUse { .. }));
    }

    #[tokio::test]
    async fn sign_up_rejects_weak_password() {
        let gateway = InMemoryAuthGateway::new();
        let err = gateway
            .sign_up("Ada", "ada@example.com", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { min_len: 6 }));
    }

    #[tokio::test]
    async fn sign_up_rejects_invalid_email() {
        let gateway = InMemoryAuthGateway::new();
        let err = gateway.sign_up("Ada", "not-an-email", "hunter22").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn sign_in_validates_credentials() {
        let gateway = InMemoryAuthGateway::new();
        gateway
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        gateway.sign_out().await.unwrap();

        let err = gateway
            .sign_in("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(gateway.current_session().await.is_none());

        let session = gateway.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn sign_in_unknown_email_is_invalid_credentials() {
        let gateway = InMemoryAuthGateway::new();
        let err = gateway
            .sign_in("ghost@example.com", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn sign_out_clears_current_session() {
        let gateway = InMemoryAuthGateway::new();
        gateway
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        gateway.sign_out().await.unwrap();
        assert!(gateway.current_session().await.is_none());
    }

    #[tokio::test]
    async fn password_reset_requires_known_account() {
        let gateway = InMemoryAuthGateway::new();
        gateway
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();

        assert!(gateway.send_password_reset("ada@example.com").await.is_ok());
        assert!(matches!(
            gateway.send_password_reset("ghost@example.com").await,
            Err(AuthError::UserNotFound { .. })
        ));
        assert!(matches!(
            gateway.send_password_reset("").await,
            Err(AuthError::InvalidEmail(_))
        ));
    }
}
