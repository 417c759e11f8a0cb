//! Speech capture for aide
//!
//! This crate bridges continuous microphone audio into incremental
//! transcripts: an [`AudioTap`] claims the input device, a [`Recognizer`]
//! turns PCM frames into [`TranscriptEvent`]s, and a
//! [`SpeechCaptureSession`] drives the lifecycle
//! (`Stopped → Starting → Active → Finalized | Cancelled | Errored`).

use std::sync::atomic::{AtomicU64, Ordering};

pub mod authorization;
pub mod recognizer;
pub mod recognizers;
pub mod session;
pub mod tap;
pub mod types;

pub use authorization::{
    AlwaysGranted, AuthorizationCache, AuthorizationDecision, AuthorizationProvider,
};
pub use recognizer::Recognizer;
pub use session::{SessionHandle, SpeechCaptureSession};
pub use tap::{AudioTap, CpalAudioTap, MockAudioTap, TapStats};
pub use types::{CaptureConfig, SessionState, TranscriptEvent};

/// Generates unique utterance IDs
static UTTERANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique utterance ID
pub fn next_utterance_id() -> u64 {
    UTTERANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
