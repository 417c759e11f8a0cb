//! Speech/microphone authorization, requested once and cached.
//!
//! The platform is prompted at most once; a definitive decision (granted or
//! denied) is cached and every later session start reads the cache instead of
//! re-prompting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Granted,
    Denied,
}

/// Source of the platform authorization prompt.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn request(&self) -> AuthorizationDecision;
}

/// Grants unconditionally. Stand-in on platforms without a prompt.
#[derive(Debug, Clone, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl AuthorizationProvider for AlwaysGranted {
    async fn request(&self) -> AuthorizationDecision {
        AuthorizationDecision::Granted
    }
}

pub struct AuthorizationCache {
    provider: Arc<dyn AuthorizationProvider>,
    decision: Mutex<Option<AuthorizationDecision>>,
}

impl AuthorizationCache {
    pub fn new(provider: Arc<dyn AuthorizationProvider>) -> Self {
        Self {
            provider,
            decision: Mutex::new(None),
        }
    }

    pub fn granted() -> Self {
        Self::new(Arc::new(AlwaysGranted))
    }

    /// The first call prompts the provider; every later call returns the
    /// cached decision. The lock is held across the prompt so concurrent
    /// first calls cannot double-prompt.
    pub async fn check(&self) -> AuthorizationDecision {
        let mut slot = self.decision.lock().await;
        if let Some(decision) = *slot {
            return decision;
        }
        let decision = self.provider.request().await;
        info!(target: "capture", "Speech authorization decided: {:?}", decision);
        *slot = Some(decision);
        decision
    }
}
