//! Core types for speech capture

use std::time::Duration;

use aide_foundation::CaptureError;

/// Transcript event types
#[derive(Debug, Clone)]
pub enum TranscriptEvent {
    /// Partial transcript (ongoing speech); overwrites the live input buffer.
    Partial { utterance_id: u64, text: String },
    /// Final transcript; ends the capture session.
    Final { utterance_id: u64, text: String },
    /// Recognition error.
    Error { code: String, message: String },
}

/// Capture session configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Tear the session down if no recognizer event arrives within this
    /// window. `None` disables the timeout.
    pub silence_timeout: Option<Duration>,
    /// Buffered transcript events before backpressure applies.
    pub event_channel_capacity: usize,
    /// Buffered audio frames between the tap and the recognizer.
    pub frame_channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_timeout: Some(Duration::from_secs(8)),
            event_channel_capacity: 64,
            frame_channel_capacity: 256,
        }
    }
}

/// Capture session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Active,
    Finalized,
    Cancelled,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Finalized | SessionState::Cancelled | SessionState::Errored
        )
    }

    pub fn can_transition(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Stopped, SessionState::Starting)
                | (SessionState::Starting, SessionState::Active)
                | (SessionState::Starting, SessionState::Errored)
                | (SessionState::Active, SessionState::Finalized)
                | (SessionState::Active, SessionState::Cancelled)
                | (SessionState::Active, SessionState::Errored)
        )
    }

    pub fn validate_transition(self, next: SessionState) -> Result<SessionState, CaptureError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(CaptureError::InvalidTransition {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            })
        }
    }
}
