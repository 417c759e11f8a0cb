//! eSpeak speech output implementation

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use aide_foundation::TtsError;

use crate::SpeechOutput;

const DEFAULT_SPEECH_RATE: u32 = 180;

/// Speaks through the espeak (or espeak-ng) binary, one process per
/// utterance.
pub struct EspeakOutput {
    command: String,
    speech_rate: u32,
}

impl EspeakOutput {
    /// Probe the PATH for espeak/espeak-ng once and keep the command name.
    pub async fn discover() -> Result<Self, TtsError> {
        let command = espeak_command().await.ok_or_else(|| {
            TtsError::EngineNotAvailable(
                "neither espeak nor espeak-ng found on PATH".to_string(),
            )
        })?;
        debug!(target: "tts", "Using speech command: {}", command);
        Ok(Self {
            command,
            speech_rate: DEFAULT_SPEECH_RATE,
        })
    }

    pub fn with_rate(mut self, words_per_minute: u32) -> Self {
        self.speech_rate = words_per_minute;
        self
    }

    fn build_args(&self, text: &str) -> Vec<String> {
        vec!["-s".to_string(), self.speech_rate.to_string(), text.to_string()]
    }
}

async fn espeak_command() -> Option<String> {
    for candidate in ["espeak", "espeak-ng"] {
        if Command::new(candidate)
            .arg("--version")
            .output()
            .await
            .is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

#[async_trait]
impl SpeechOutput for EspeakOutput {
    fn name(&self) -> &str {
        "eSpeak"
    }

    async fn speak(&self, text: &str) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let output = Command::new(&self.command)
            .args(self.build_args(text))
            .output()
            .await?;
        if !output.status.success() {
            return Err(TtsError::SynthesisFailed(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_carry_rate_and_text() {
        let output = EspeakOutput {
            command: "espeak".to_string(),
            speech_rate: 150,
        };
        let args = output.build_args("hello world");
        assert_eq!(args, vec!["-s", "150", "hello world"]);
    }

    #[tokio::test]
    async fn discover_does_not_panic_without_espeak() {
        // The test environment may or may not have espeak installed; either
        // outcome is acceptable, discovery just must not panic.
        let _ = EspeakOutput::discover().await;
    }
}
