//! Capture session lifecycle.
//!
//! A session claims the microphone through an [`AudioTap`], drives a
//! [`Recognizer`] over the incoming frames, and emits [`TranscriptEvent`]s
//! until a final transcript, a stop request, a silence timeout, or a
//! recognition error ends it. The tap comes off on every exit path.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use aide_foundation::CaptureError;

use crate::authorization::{AuthorizationCache, AuthorizationDecision};
use crate::recognizer::Recognizer;
use crate::tap::AudioTap;
use crate::types::{CaptureConfig, SessionState, TranscriptEvent};

pub struct SpeechCaptureSession;

/// Handle to a running capture session.
///
/// `events` streams partial/final transcripts; the state watch reflects the
/// lifecycle. Dropping the handle abandons the session task but the task
/// still removes its tap on exit.
pub struct SessionHandle {
    pub events: mpsc::Receiver<TranscriptEvent>,
    state_rx: watch::Receiver<SessionState>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Forcibly tear the session down without submitting a command.
    pub async fn stop(self) -> SessionState {
        let _ = self.stop_tx.send(true);
        self.join().await
    }

    /// Wait for the session task to finish and return the terminal state.
    pub async fn join(self) -> SessionState {
        if self.task.await.is_err() {
            warn!(target: "capture", "Capture session task panicked");
        }
        *self.state_rx.borrow()
    }
}

impl SpeechCaptureSession {
    /// Claim the microphone and begin streaming transcripts.
    ///
    /// Fails with `PermissionDenied` when authorization is (or was) denied
    /// and `AudioSession` when the input device cannot be claimed. No
    /// transcript events are ever emitted on a failed start.
    pub async fn start(
        mut tap: Box<dyn AudioTap>,
        recognizer: Box<dyn Recognizer>,
        authorization: &AuthorizationCache,
        config: CaptureConfig,
    ) -> Result<SessionHandle, CaptureError> {
        if authorization.check().await == AuthorizationDecision::Denied {
            return Err(CaptureError::PermissionDenied);
        }

        let (state_tx, state_rx) = watch::channel(SessionState::Stopped);
        transition(&state_tx, SessionState::Starting);

        let (frame_tx, frame_rx) = mpsc::channel(config.frame_channel_capacity);
        tap.install(frame_tx)?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run_session(
            tap, recognizer, config, frame_rx, event_tx, state_tx, stop_rx,
        ));

        Ok(SessionHandle {
            events: event_rx,
            state_rx,
            stop_tx,
            task,
        })
    }
}

async fn run_session(
    mut tap: Box<dyn AudioTap>,
    mut recognizer: Box<dyn Recognizer>,
    config: CaptureConfig,
    mut frames: mpsc::Receiver<Vec<i16>>,
    events: mpsc::Sender<TranscriptEvent>,
    state: watch::Sender<SessionState>,
    mut stop: watch::Receiver<bool>,
) {
    if let Err(e) = recognizer.reset().await {
        warn!(target: "capture", "Recognizer reset failed: {e}");
    }
    transition(&state, SessionState::Active);
    info!(target: "capture", "Capture session active");

    let mut deadline = silence_deadline(config.silence_timeout);

    let terminal = loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    debug!(target: "capture", "Capture session stop requested");
                    break SessionState::Cancelled;
                }
            }

            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    error!(target: "capture", "Audio tap stopped delivering frames");
                    forward(&events, TranscriptEvent::Error {
                        code: "AUDIO_TAP_CLOSED".to_string(),
                        message: "audio input stopped delivering frames".to_string(),
                    }).await;
                    break SessionState::Errored;
                };
                match recognizer.accept_frame(&frame).await {
                    Ok(None) => {}
                    Ok(Some(event)) => {
                        deadline = silence_deadline(config.silence_timeout);
                        let is_final = matches!(event, TranscriptEvent::Final { .. });
                        forward(&events, event).await;
                        if is_final {
                            break SessionState::Finalized;
                        }
                    }
                    Err(e) => {
                        error!(target: "capture", "Recognition failed: {e}");
                        forward(&events, TranscriptEvent::Error {
                            code: "RECOGNITION_FAILED".to_string(),
                            message: e.to_string(),
                        }).await;
                        break SessionState::Errored;
                    }
                }
            }

            _ = sleep_until_opt(deadline) => {
                debug!(target: "capture", "Silence timeout reached, finalizing utterance");
                match recognizer.finalize().await {
                    Ok(Some(event @ TranscriptEvent::Final { .. })) => {
                        forward(&events, event).await;
                        break SessionState::Finalized;
                    }
                    Ok(_) => break SessionState::Cancelled,
                    Err(e) => {
                        forward(&events, TranscriptEvent::Error {
                            code: "RECOGNITION_FAILED".to_string(),
                            message: e.to_string(),
                        }).await;
                        break SessionState::Errored;
                    }
                }
            }
        }
    };

    // every exit path releases the device
    tap.remove();
    transition(&state, terminal);
    info!(target: "capture", "Capture session ended: {:?}", terminal);
}

fn transition(state: &watch::Sender<SessionState>, next: SessionState) {
    let current = *state.borrow();
    match current.validate_transition(next) {
        Ok(next) => {
            debug!(target: "capture", "Session state: {:?} -> {:?}", current, next);
            let _ = state.send(next);
        }
        Err(e) => warn!(target: "capture", "{e}"),
    }
}

fn silence_deadline(timeout: Option<Duration>) -> Option<tokio::time::Instant> {
    timeout.map(|t| tokio::time::Instant::now() + t)
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn forward(events: &mpsc::Sender<TranscriptEvent>, event: TranscriptEvent) {
    match &event {
        TranscriptEvent::Partial { text, .. } => debug!(target: "capture", "Partial: {}", text),
        TranscriptEvent::Final { text, .. } => info!(target: "capture", "Final: {}", text),
        TranscriptEvent::Error { code, message } => {
            error!(target: "capture", "Error [{}]: {}", code, message)
        }
    }

    // Send with backpressure, bounded so a stalled consumer cannot wedge the
    // session forever.
    match tokio::time::timeout(Duration::from_secs(5), events.send(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => debug!(target: "capture", "Transcript channel closed"),
        Err(_) => {
            warn!(target: "capture", "Transcript send timed out after 5s - consumer too slow")
        }
    }
}
