//! Scripted recognizer for tests and demos

use aide_foundation::CaptureError;
use async_trait::async_trait;
use tracing::info;

use crate::next_utterance_id;
use crate::recognizer::Recognizer;
use crate::types::TranscriptEvent;

/// Configuration for scripted transcripts
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Partial texts emitted in order, one per `frames_per_event` frames.
    pub partials: Vec<String>,
    /// Final text emitted after the partials are exhausted (or on finalize).
    pub final_text: Option<String>,
    /// Frames consumed between successive events.
    pub frames_per_event: usize,
    /// Fail with a recognizer error once this many frames were accepted.
    pub fail_after_frames: Option<usize>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            partials: Vec::new(),
            final_text: Some("scripted test utterance".to_string()),
            frames_per_event: 1,
            fail_after_frames: None,
        }
    }
}

/// Emits a fixed sequence of partial and final transcripts.
#[derive(Debug)]
pub struct ScriptedRecognizer {
    config: ScriptConfig,
    utterance_id: u64,
    frames_seen: usize,
    partials_emitted: usize,
    finished: bool,
}

impl ScriptedRecognizer {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            utterance_id: next_utterance_id(),
            frames_seen: 0,
            partials_emitted: 0,
            finished: false,
        }
    }

    /// Final transcript on the first frame, no partials.
    pub fn with_final(text: &str) -> Self {
        Self::new(ScriptConfig {
            final_text: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn with_script(partials: &[&str], final_text: &str) -> Self {
        Self::new(ScriptConfig {
            partials: partials.iter().map(|s| s.to_string()).collect(),
            final_text: Some(final_text.to_string()),
            ..Default::default()
        })
    }

    /// Never produces a transcript, fails after `frames` frames.
    pub fn failing_after(frames: usize) -> Self {
        Self::new(ScriptConfig {
            partials: Vec::new(),
            final_text: None,
            fail_after_frames: Some(frames),
            ..Default::default()
        })
    }

    /// Never produces a transcript at all; the session ends by stop or
    /// silence timeout.
    pub fn silent() -> Self {
        Self::new(ScriptConfig {
            partials: Vec::new(),
            final_text: None,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn accept_frame(
        &mut self,
        _pcm: &[i16],
    ) -> Result<Option<TranscriptEvent>, CaptureError> {
        self.frames_seen += 1;

        if let Some(limit) = self.config.fail_after_frames {
            if self.frames_seen > limit {
                return Err(CaptureError::Recognizer(
                    "simulated recognition failure".to_string(),
                ));
            }
        }

        if self.finished || self.frames_seen % self.config.frames_per_event != 0 {
            return Ok(None);
        }

        if self.partials_emitted < self.config.partials.len() {
            let text = self.config.partials[self.partials_emitted].clone();
            self.partials_emitted += 1;
            return Ok(Some(TranscriptEvent::Partial {
                utterance_id: self.utterance_id,
                text,
            }));
        }

        match self.config.final_text.clone() {
            Some(text) => {
                info!("ScriptedRecognizer: producing final after {} frames", self.frames_seen);
                self.finished = true;
                Ok(Some(TranscriptEvent::Final {
                    utterance_id: self.utterance_id,
                    text,
                }))
            }
            None => Ok(None),
        }
    }

    async fn finalize(&mut self) -> Result<Option<TranscriptEvent>, CaptureError> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        Ok(self.config.final_text.clone().map(|text| TranscriptEvent::Final {
            utterance_id: self.utterance_id,
            text,
        }))
    }

    async fn reset(&mut self) -> Result<(), CaptureError> {
        self.utterance_id = next_utterance_id();
        self.frames_seen = 0;
        self.partials_emitted = 0;
        self.finished = false;
        Ok(())
    }
}
