//! Remote completion client for aide
//!
//! A completion is a single stateless request/response call to a hosted
//! text-generation endpoint. No streaming and no conversation context is
//! carried between calls; each call is independent.

pub mod http;
pub mod types;

pub use http::HttpCompletionClient;
pub use types::{CompletionConfig, CompletionRequest, CompletionResponse};

use aide_foundation::CompletionError;
use async_trait::async_trait;

/// Core completion interface.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one prompt and return the model's response text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}
