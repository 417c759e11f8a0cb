//! Speech output for aide
//!
//! Converts response text to audio. Failures are surfaced as status text by
//! the caller, never fatal.

pub mod espeak;

pub use espeak::EspeakOutput;

use aide_foundation::TtsError;
use async_trait::async_trait;
use tracing::debug;

/// Text-to-speech playback interface.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// Speak the given text, returning once playback finished.
    async fn speak(&self, text: &str) -> Result<(), TtsError>;
}

/// Discards all speech. Used for silent runs and environments without an
/// audio device.
#[derive(Debug, Clone, Default)]
pub struct NullOutput;

impl NullOutput {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechOutput for NullOutput {
    fn name(&self) -> &str {
        "null"
    }

    async fn speak(&self, text: &str) -> Result<(), TtsError> {
        debug!(target: "tts", "Discarding speech output ({} chars)", text.len());
        Ok(())
    }
}
