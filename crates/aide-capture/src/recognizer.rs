//! Recognition interface bridging audio frames to transcripts.

use aide_foundation::CaptureError;
use async_trait::async_trait;

use crate::types::TranscriptEvent;

/// Streaming speech recognition interface.
///
/// Implementations wrap a platform or remote recognition service. The
/// capture session feeds 16-bit mono PCM frames and forwards the returned
/// events; a `Final` event ends the session.
#[async_trait]
pub trait Recognizer: Send {
    /// Feed PCM samples. Returns a transcript event when one is ready.
    async fn accept_frame(&mut self, pcm: &[i16])
        -> Result<Option<TranscriptEvent>, CaptureError>;

    /// Signal end of input for the current utterance and get the final
    /// result if any.
    async fn finalize(&mut self) -> Result<Option<TranscriptEvent>, CaptureError>;

    /// Reset recognizer state for a new utterance.
    async fn reset(&mut self) -> Result<(), CaptureError>;
}
