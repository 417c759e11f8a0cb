//! No-operation recognizer for fallback use

use aide_foundation::CaptureError;
use async_trait::async_trait;

use crate::recognizer::Recognizer;
use crate::types::TranscriptEvent;

/// A recognizer that never transcribes anything.
///
/// Used when no speech backend is configured; the session still claims the
/// microphone and ends via stop or the silence timeout.
#[derive(Debug, Clone, Default)]
pub struct NoopRecognizer;

impl NoopRecognizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Recognizer for NoopRecognizer {
    async fn accept_frame(
        &mut self,
        _pcm: &[i16],
    ) -> Result<Option<TranscriptEvent>, CaptureError> {
        Ok(None)
    }

    async fn finalize(&mut self) -> Result<Option<TranscriptEvent>, CaptureError> {
        Ok(None)
    }

    async fn reset(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}
