//! The command dispatcher event loop.
//!
//! Control commands (toggle, submit), capture session events, and completion
//! results all funnel into `CommandDispatcher::run`, which applies them
//! serially. Completion calls run as spawned tasks and re-enter the loop as
//! events carrying a generation token; stale results are dropped instead of
//! overwriting a newer response.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use aide_capture::{
    AudioTap, AuthorizationCache, CaptureConfig, Recognizer, SessionHandle,
    SpeechCaptureSession, TranscriptEvent,
};
use aide_completion::CompletionClient;
use aide_foundation::{CaptureError, CompletionError, DispatchError, StateCell};
use aide_tts::SpeechOutput;

use crate::metrics::DispatchMetrics;

pub const STATUS_READY: &str = "Ready to receive commands.";
pub const STATUS_LISTENING: &str = "I'm listening...";
pub const STATUS_STOPPED: &str = "Stopped listening.";
pub const STATUS_TAP_AGAIN: &str = "Tap to speak again.";
pub const STATUS_NOT_AUTHORIZED: &str = "Speech recognition not authorized.";

/// Whether the dispatcher currently owns a live capture session. Owned
/// exclusively by the dispatcher; transitions only via toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

/// Builds the collaborators for each new capture session.
pub trait SessionFactory: Send {
    fn tap(&self) -> Box<dyn AudioTap>;
    fn recognizer(&self) -> Box<dyn Recognizer>;
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub capture: CaptureConfig,
}

enum Control {
    Toggle,
    Submit(String),
    Shutdown,
}

struct CompletionOutcome {
    generation: u64,
    result: Result<String, CompletionError>,
}

pub struct CommandDispatcher {
    control_rx: mpsc::Receiver<Control>,
    factory: Box<dyn SessionFactory>,
    authorization: AuthorizationCache,
    completion: Arc<dyn CompletionClient>,
    speech: Arc<dyn SpeechOutput>,
    config: DispatcherConfig,

    capture_state: StateCell<CaptureState>,
    pending_input: StateCell<String>,
    response_text: StateCell<String>,
    status: StateCell<String>,
    history: StateCell<Vec<String>>,

    active: Option<SessionHandle>,
    completion_tx: mpsc::Sender<CompletionOutcome>,
    completion_rx: mpsc::Receiver<CompletionOutcome>,
    generation: u64,
    metrics: Arc<parking_lot::RwLock<DispatchMetrics>>,
}

/// Cloneable front half of the dispatcher: sends control commands and
/// observes state.
#[derive(Clone)]
pub struct DispatcherHandle {
    control_tx: mpsc::Sender<Control>,
    capture_state: watch::Receiver<CaptureState>,
    pending_input: watch::Receiver<String>,
    response_text: watch::Receiver<String>,
    status: watch::Receiver<String>,
    history: watch::Receiver<Vec<String>>,
    metrics: Arc<parking_lot::RwLock<DispatchMetrics>>,
}

impl CommandDispatcher {
    pub fn new(
        factory: Box<dyn SessionFactory>,
        authorization: AuthorizationCache,
        completion: Arc<dyn CompletionClient>,
        speech: Arc<dyn SpeechOutput>,
        config: DispatcherConfig,
    ) -> (Self, DispatcherHandle) {
        let (control_tx, control_rx) = mpsc::channel(16);
        let (completion_tx, completion_rx) = mpsc::channel(16);

        let capture_state = StateCell::new(CaptureState::Idle);
        let pending_input = StateCell::new(String::new());
        let response_text = StateCell::new(String::new());
        let status = StateCell::new(STATUS_READY.to_string());
        let history: StateCell<Vec<String>> = StateCell::default();
        let metrics = Arc::new(parking_lot::RwLock::new(DispatchMetrics::default()));

        let handle = DispatcherHandle {
            control_tx,
            capture_state: capture_state.subscribe(),
            pending_input: pending_input.subscribe(),
            response_text: response_text.subscribe(),
            status: status.subscribe(),
            history: history.subscribe(),
            metrics: metrics.clone(),
        };

        let dispatcher = Self {
            control_rx,
            factory,
            authorization,
            completion,
            speech,
            config,
            capture_state,
            pending_input,
            response_text,
            status,
            history,
            active: None,
            completion_tx,
            completion_rx,
            generation: 0,
            metrics,
        };

        (dispatcher, handle)
    }

    /// Run the dispatch loop until shutdown.
    pub async fn run(mut self) {
        info!(target: "dispatch", "Command dispatcher running");

        loop {
            tokio::select! {
                maybe_ctrl = self.control_rx.recv() => {
                    match maybe_ctrl {
                        Some(Control::Toggle) => self.handle_toggle().await,
                        Some(Control::Submit(text)) => {
                            if let Err(e) = self.handle_submit(text).await {
                                debug!(target: "dispatch", "Submit rejected: {e}");
                            }
                        }
                        Some(Control::Shutdown) | None => break,
                    }
                }

                Some(outcome) = self.completion_rx.recv() => {
                    self.handle_completion(outcome).await;
                }

                event = next_event(&mut self.active), if self.active.is_some() => {
                    match event {
                        Some(event) => self.handle_transcript(event).await,
                        // session ended without a final transcript
                        None => self.reap_session(STATUS_STOPPED.to_string()).await,
                    }
                }
            }
        }

        if let Some(handle) = self.active.take() {
            handle.stop().await;
        }
        info!(target: "dispatch", "Command dispatcher stopped");
    }

    async fn handle_toggle(&mut self) {
        match self.capture_state.get() {
            CaptureState::Listening => {
                if let Some(handle) = self.active.take() {
                    let state = handle.stop().await;
                    debug!(target: "dispatch", "Capture session stopped: {:?}", state);
                }
                self.capture_state.set(CaptureState::Idle);
                self.status.set(STATUS_STOPPED.to_string());
            }
            CaptureState::Idle => {
                // a prior session may still be winding down; it must release
                // the microphone before a new one claims it
                if let Some(handle) = self.active.take() {
                    handle.stop().await;
                }
                match SpeechCaptureSession::start(
                    self.factory.tap(),
                    self.factory.recognizer(),
                    &self.authorization,
                    self.config.capture.clone(),
                )
                .await
                {
                    Ok(handle) => {
                        self.active = Some(handle);
                        self.capture_state.set(CaptureState::Listening);
                        self.status.set(STATUS_LISTENING.to_string());
                    }
                    Err(CaptureError::PermissionDenied) => {
                        warn!(target: "dispatch", "Speech capture not authorized");
                        self.status.set(STATUS_NOT_AUTHORIZED.to_string());
                    }
                    Err(e) => {
                        error!(target: "dispatch", "Failed to start capture: {e}");
                        self.status.set(format!("Could not start listening: {e}"));
                    }
                }
            }
        }
    }

    async fn handle_transcript(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Partial { text, .. } => {
                self.metrics.write().transcripts_partial += 1;
                self.pending_input.set(text);
            }
            TranscriptEvent::Final { text, .. } => {
                self.metrics.write().transcripts_final += 1;
                self.reap_session(STATUS_TAP_AGAIN.to_string()).await;
                if let Err(e) = self.handle_submit(text).await {
                    debug!(target: "dispatch", "Final transcript not submitted: {e}");
                }
            }
            TranscriptEvent::Error { message, .. } => {
                self.metrics.write().transcript_errors += 1;
                self.reap_session(format!("Speech recognition error: {message}"))
                    .await;
            }
        }
    }

    async fn reap_session(&mut self, status: String) {
        if let Some(handle) = self.active.take() {
            let state = handle.join().await;
            debug!(target: "dispatch", "Capture session reaped: {:?}", state);
        }
        self.capture_state.set(CaptureState::Idle);
        self.status.set(status);
    }

    async fn handle_submit(&mut self, text: String) -> Result<(), DispatchError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DispatchError::EmptyInput);
        }
        let command = trimmed.to_string();
        info!(target: "dispatch", "Command submitted: {}", command);

        self.history.update(|h| h.push(command.clone()));
        self.pending_input.set(String::new());
        self.metrics.write().commands_submitted += 1;

        self.dispatch(command);
        Ok(())
    }

    /// Single attempt per command; the result re-enters the loop tagged with
    /// its generation.
    fn dispatch(&mut self, command: String) {
        self.generation += 1;
        let generation = self.generation;
        let client = self.completion.clone();
        let outcome_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = client.complete(&command).await;
            if outcome_tx
                .send(CompletionOutcome { generation, result })
                .await
                .is_err()
            {
                debug!(target: "dispatch", "Dispatcher gone before completion arrived");
            }
        });
    }

    async fn handle_completion(&mut self, outcome: CompletionOutcome) {
        if outcome.generation != self.generation {
            self.metrics.write().stale_responses_dropped += 1;
            debug!(
                target: "dispatch",
                "Dropping stale completion (generation {}, current {})",
                outcome.generation,
                self.generation
            );
            return;
        }

        let text = match outcome.result {
            Ok(text) => {
                self.metrics.write().completions_ok += 1;
                format!("Response: {text}")
            }
            Err(e) => {
                self.metrics.write().completions_failed += 1;
                warn!(target: "dispatch", "Completion failed: {e}");
                format!("Error communicating with the assistant: {e}")
            }
        };

        self.response_text.set(text.clone());

        // errors are spoken too, never swallowed
        let speech = self.speech.clone();
        tokio::spawn(async move {
            if let Err(e) = speech.speak(&text).await {
                warn!(target: "dispatch", "Speech output failed: {e}");
            }
        });
    }
}

async fn next_event(session: &mut Option<SessionHandle>) -> Option<TranscriptEvent> {
    match session.as_mut() {
        Some(handle) => handle.events.recv().await,
        None => std::future::pending().await,
    }
}

impl DispatcherHandle {
    /// Toggle between listening and idle.
    pub async fn toggle_listening(&self) -> Result<(), DispatchError> {
        self.control_tx
            .send(Control::Toggle)
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }

    /// Submit typed text as a command. Rejects empty/whitespace input without
    /// touching the dispatcher.
    pub async fn submit(&self, text: &str) -> Result<(), DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::EmptyInput);
        }
        self.control_tx
            .send(Control::Submit(text.to_string()))
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }

    /// Ask the dispatch loop to exit.
    pub async fn shutdown(&self) -> Result<(), DispatchError> {
        self.control_tx
            .send(Control::Shutdown)
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }

    pub fn capture_state(&self) -> CaptureState {
        *self.capture_state.borrow()
    }

    pub fn subscribe_capture_state(&self) -> watch::Receiver<CaptureState> {
        self.capture_state.clone()
    }

    pub fn pending_input(&self) -> String {
        self.pending_input.borrow().clone()
    }

    pub fn subscribe_pending_input(&self) -> watch::Receiver<String> {
        self.pending_input.clone()
    }

    pub fn response_text(&self) -> String {
        self.response_text.borrow().clone()
    }

    pub fn subscribe_response_text(&self) -> watch::Receiver<String> {
        self.response_text.clone()
    }

    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status.clone()
    }

    /// Snapshot of the append-only command history.
    pub fn commands(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn subscribe_commands(&self) -> watch::Receiver<Vec<String>> {
        self.history.clone()
    }

    pub fn metrics(&self) -> DispatchMetrics {
        self.metrics.read().clone()
    }
}
