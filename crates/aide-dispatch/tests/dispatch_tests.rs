//! Dispatcher tests
//!
//! Tests cover:
//! - submit semantics (history append, pending buffer, empty-input rejection)
//! - toggle semantics (single tap invariant, status strings)
//! - transcript handling (final submits exactly once)
//! - completion handling (response formatting, spoken errors, fencing)
//! - authorization denial surfaced as status

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::timeout;

use aide_capture::recognizers::{ScriptConfig, ScriptedRecognizer};
use aide_capture::{
    AudioTap, AuthorizationCache, AuthorizationDecision, AuthorizationProvider, CaptureConfig,
    MockAudioTap, Recognizer, TapStats,
};
use aide_completion::CompletionClient;
use aide_dispatch::{
    CaptureState, CommandDispatcher, DispatcherConfig, DispatcherHandle, SessionFactory,
    STATUS_LISTENING, STATUS_NOT_AUTHORIZED, STATUS_STOPPED, STATUS_TAP_AGAIN,
};
use aide_foundation::{CompletionError, DispatchError, TtsError};
use aide_tts::SpeechOutput;

const WAIT: Duration = Duration::from_secs(2);

// ─── Fakes ──────────────────────────────────────────────────────────

enum FakeOutcome {
    Success { text: String, delay: Duration },
    Failure { delay: Duration },
}

impl FakeOutcome {
    fn ok(text: &str) -> Self {
        Self::Success {
            text: text.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn ok_after(text: &str, delay: Duration) -> Self {
        Self::Success {
            text: text.to_string(),
            delay,
        }
    }

    fn fail() -> Self {
        Self::Failure {
            delay: Duration::ZERO,
        }
    }
}

/// Outcomes are keyed by prompt: concurrent in-flight calls must not race
/// for a shared queue.
struct FakeCompletion {
    outcomes: Mutex<HashMap<String, FakeOutcome>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .remove(prompt)
            .unwrap_or_else(|| FakeOutcome::ok("default"));
        match outcome {
            FakeOutcome::Success { text, delay } => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            FakeOutcome::Failure { delay } => {
                tokio::time::sleep(delay).await;
                Err(CompletionError::Network(
                    "simulated network failure".to_string(),
                ))
            }
        }
    }
}

struct CountingSpeech {
    spoken: Mutex<Vec<String>>,
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl SpeechOutput for CountingSpeech {
    fn name(&self) -> &str {
        "counting"
    }

    async fn speak(&self, text: &str) -> Result<(), TtsError> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockFactory {
    stats: Arc<TapStats>,
    script: ScriptConfig,
}

impl SessionFactory for MockFactory {
    fn tap(&self) -> Box<dyn AudioTap> {
        Box::new(MockAudioTap::new(self.stats.clone()))
    }

    fn recognizer(&self) -> Box<dyn Recognizer> {
        Box::new(ScriptedRecognizer::new(self.script.clone()))
    }
}

struct DeniedProvider;

#[async_trait]
impl AuthorizationProvider for DeniedProvider {
    async fn request(&self) -> AuthorizationDecision {
        AuthorizationDecision::Denied
    }
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    handle: DispatcherHandle,
    tap_stats: Arc<TapStats>,
    completion_calls: Arc<AtomicUsize>,
    speech_count: Arc<AtomicUsize>,
}

fn silent_script() -> ScriptConfig {
    ScriptConfig {
        partials: Vec::new(),
        final_text: None,
        frames_per_event: 1,
        fail_after_frames: None,
    }
}

fn spawn_dispatcher(
    outcomes: Vec<(&str, FakeOutcome)>,
    script: ScriptConfig,
    authorization: AuthorizationCache,
) -> Harness {
    let tap_stats = Arc::new(TapStats::default());
    let completion_calls = Arc::new(AtomicUsize::new(0));
    let speech_count = Arc::new(AtomicUsize::new(0));

    let (dispatcher, handle) = CommandDispatcher::new(
        Box::new(MockFactory {
            stats: tap_stats.clone(),
            script,
        }),
        authorization,
        Arc::new(FakeCompletion {
            outcomes: Mutex::new(
                outcomes
                    .into_iter()
                    .map(|(prompt, outcome)| (prompt.to_string(), outcome))
                    .collect(),
            ),
            calls: completion_calls.clone(),
        }),
        Arc::new(CountingSpeech {
            spoken: Mutex::new(Vec::new()),
            count: speech_count.clone(),
        }),
        DispatcherConfig {
            capture: CaptureConfig {
                silence_timeout: None,
                ..Default::default()
            },
        },
    );
    tokio::spawn(dispatcher.run());

    Harness {
        handle,
        tap_stats,
        completion_calls,
        speech_count,
    }
}

async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, pred: F)
where
    F: FnMut(&T) -> bool,
{
    timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("condition within deadline")
        .expect("dispatcher alive");
}

async fn wait_count(counter: &AtomicUsize, expected: usize) {
    timeout(WAIT, async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("count within deadline");
}

// ─── Submit Tests ───────────────────────────────────────────────────

#[tokio::test]
async fn submit_appends_history_and_clears_pending() {
    let h = spawn_dispatcher(
        vec![("hello", FakeOutcome::ok("hi there"))],
        silent_script(),
        AuthorizationCache::granted(),
    );

    h.handle.submit("  hello  ").await.unwrap();

    let mut commands = h.handle.subscribe_commands();
    wait_for(&mut commands, |c| !c.is_empty()).await;
    assert_eq!(h.handle.commands(), vec!["hello".to_string()]);
    assert_eq!(h.handle.pending_input(), "");
    assert_eq!(h.handle.metrics().commands_submitted, 1);
}

#[tokio::test]
async fn empty_submit_is_rejected_without_side_effects() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());

    let err = h.handle.submit("   ").await.unwrap_err();
    assert!(matches!(err, DispatchError::EmptyInput));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.handle.commands().is_empty());
    assert_eq!(h.completion_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.handle.metrics().commands_submitted, 0);
}

#[tokio::test]
async fn history_preserves_insertion_order_without_dedup() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());

    h.handle.submit("lights on").await.unwrap();
    h.handle.submit("lights on").await.unwrap();
    h.handle.submit("music").await.unwrap();

    let mut commands = h.handle.subscribe_commands();
    wait_for(&mut commands, |c| c.len() == 3).await;
    assert_eq!(
        h.handle.commands(),
        vec![
            "lights on".to_string(),
            "lights on".to_string(),
            "music".to_string()
        ]
    );
}

// ─── Toggle Tests ───────────────────────────────────────────────────

#[tokio::test]
async fn toggle_starts_then_stops_listening() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());
    let mut state = h.handle.subscribe_capture_state();
    let mut status = h.handle.subscribe_status();

    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut state, |s| *s == CaptureState::Listening).await;
    wait_for(&mut status, |s| s == STATUS_LISTENING).await;

    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut state, |s| *s == CaptureState::Idle).await;
    wait_for(&mut status, |s| s == STATUS_STOPPED).await;

    assert_eq!(h.tap_stats.installs.load(Ordering::SeqCst), 1);
    assert_eq!(h.tap_stats.removes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rapid_double_toggle_never_overlaps_taps() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());

    h.handle.toggle_listening().await.unwrap();
    h.handle.toggle_listening().await.unwrap();

    let mut state = h.handle.subscribe_capture_state();
    wait_for(&mut state, |s| *s == CaptureState::Idle).await;
    // drain: both toggles processed, session fully stopped
    wait_count(&h.tap_stats.removes, 1).await;

    assert_eq!(h.tap_stats.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.tap_stats.installs.load(Ordering::SeqCst),
        h.tap_stats.removes.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn repeated_toggling_reuses_the_single_tap_slot() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());
    let mut state = h.handle.subscribe_capture_state();

    for _ in 0..3 {
        h.handle.toggle_listening().await.unwrap();
        wait_for(&mut state, |s| *s == CaptureState::Listening).await;
        h.handle.toggle_listening().await.unwrap();
        wait_for(&mut state, |s| *s == CaptureState::Idle).await;
    }

    assert_eq!(h.tap_stats.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(h.tap_stats.installs.load(Ordering::SeqCst), 3);
    assert_eq!(h.tap_stats.removes.load(Ordering::SeqCst), 3);
}

// ─── Transcript Tests ───────────────────────────────────────────────

#[tokio::test]
async fn final_transcript_submits_exactly_once() {
    let h = spawn_dispatcher(
        vec![("turn on the lights", FakeOutcome::ok("done"))],
        ScriptConfig {
            partials: vec!["turn".to_string(), "turn on".to_string()],
            final_text: Some("turn on the lights".to_string()),
            frames_per_event: 1,
            fail_after_frames: None,
        },
        AuthorizationCache::granted(),
    );

    let mut status = h.handle.subscribe_status();

    h.handle.toggle_listening().await.unwrap();

    // the final transcript becomes exactly one history entry
    let mut commands = h.handle.subscribe_commands();
    wait_for(&mut commands, |c| !c.is_empty()).await;
    assert_eq!(h.handle.commands(), vec!["turn on the lights".to_string()]);

    wait_for(&mut status, |s| s == STATUS_TAP_AGAIN).await;
    assert_eq!(h.handle.capture_state(), CaptureState::Idle);
    // submission cleared the live input buffer the partials had filled
    assert_eq!(h.handle.pending_input(), "");
    wait_count(&h.completion_calls, 1).await;
    assert_eq!(h.handle.metrics().transcripts_partial, 2);
    assert_eq!(h.handle.metrics().transcripts_final, 1);
    assert_eq!(h.tap_stats.removes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn partial_transcripts_overwrite_the_pending_buffer() {
    // partials only: nothing ever clears the buffer, so the last partial
    // must be visible in it
    let h = spawn_dispatcher(
        vec![],
        ScriptConfig {
            partials: vec!["turn".to_string(), "turn on".to_string()],
            final_text: None,
            frames_per_event: 1,
            fail_after_frames: None,
        },
        AuthorizationCache::granted(),
    );

    let mut pending = h.handle.subscribe_pending_input();
    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut pending, |p| p == "turn on").await;

    h.handle.toggle_listening().await.unwrap();
    let mut state = h.handle.subscribe_capture_state();
    wait_for(&mut state, |s| *s == CaptureState::Idle).await;
    assert!(h.handle.commands().is_empty());
}

#[tokio::test]
async fn stopping_before_final_submits_nothing() {
    let h = spawn_dispatcher(vec![], silent_script(), AuthorizationCache::granted());
    let mut state = h.handle.subscribe_capture_state();

    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut state, |s| *s == CaptureState::Listening).await;
    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut state, |s| *s == CaptureState::Idle).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.handle.commands().is_empty());
    assert_eq!(h.completion_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn recognition_error_surfaces_as_status_and_frees_the_tap() {
    let h = spawn_dispatcher(
        vec![],
        ScriptConfig {
            partials: Vec::new(),
            final_text: None,
            frames_per_event: 1,
            fail_after_frames: Some(2),
        },
        AuthorizationCache::granted(),
    );
    let mut status = h.handle.subscribe_status();

    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut status, |s| s.contains("Speech recognition error")).await;

    assert_eq!(h.handle.capture_state(), CaptureState::Idle);
    assert!(h.handle.commands().is_empty());
    wait_count(&h.tap_stats.removes, 1).await;
}

// ─── Completion Tests ───────────────────────────────────────────────

#[tokio::test]
async fn successful_completion_sets_response_and_speaks_once() {
    let h = spawn_dispatcher(
        vec![("hello", FakeOutcome::ok("hi there"))],
        silent_script(),
        AuthorizationCache::granted(),
    );

    h.handle.submit("hello").await.unwrap();

    let mut response = h.handle.subscribe_response_text();
    wait_for(&mut response, |r| !r.is_empty()).await;
    assert_eq!(h.handle.response_text(), "Response: hi there");

    wait_count(&h.speech_count, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.speech_count.load(Ordering::SeqCst), 1);
    assert_eq!(h.handle.metrics().completions_ok, 1);
}

#[tokio::test]
async fn failed_completion_is_displayed_and_spoken() {
    let h = spawn_dispatcher(
        vec![("hello", FakeOutcome::fail())],
        silent_script(),
        AuthorizationCache::granted(),
    );

    h.handle.submit("hello").await.unwrap();

    let mut response = h.handle.subscribe_response_text();
    wait_for(&mut response, |r| !r.is_empty()).await;
    let response_text = h.handle.response_text();
    assert!(response_text.contains("Error communicating with the assistant"));
    assert!(response_text.contains("simulated network failure"));

    wait_count(&h.speech_count, 1).await;
    assert_eq!(h.handle.metrics().completions_failed, 1);
}

#[tokio::test]
async fn stale_completion_is_fenced_off() {
    let h = spawn_dispatcher(
        vec![
            ("one", FakeOutcome::ok_after("first", Duration::from_millis(300))),
            ("two", FakeOutcome::ok_after("second", Duration::from_millis(10))),
        ],
        silent_script(),
        AuthorizationCache::granted(),
    );

    h.handle.submit("one").await.unwrap();
    h.handle.submit("two").await.unwrap();

    let mut response = h.handle.subscribe_response_text();
    wait_for(&mut response, |r| r == "Response: second").await;

    // the slow first response arrives later and must not win
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.handle.response_text(), "Response: second");
    assert_eq!(h.handle.metrics().stale_responses_dropped, 1);
    assert_eq!(h.speech_count.load(Ordering::SeqCst), 1);
}

// ─── Authorization Tests ────────────────────────────────────────────

#[tokio::test]
async fn permission_denied_keeps_dispatcher_idle() {
    let h = spawn_dispatcher(
        vec![],
        ScriptConfig {
            partials: Vec::new(),
            final_text: Some("never submitted".to_string()),
            frames_per_event: 1,
            fail_after_frames: None,
        },
        AuthorizationCache::new(Arc::new(DeniedProvider)),
    );
    let mut status = h.handle.subscribe_status();

    h.handle.toggle_listening().await.unwrap();
    wait_for(&mut status, |s| s == STATUS_NOT_AUTHORIZED).await;

    assert_eq!(h.handle.capture_state(), CaptureState::Idle);
    assert!(h.handle.commands().is_empty());
    assert_eq!(h.tap_stats.installs.load(Ordering::SeqCst), 0);
    assert_eq!(h.handle.metrics().transcripts_partial, 0);
    assert_eq!(h.handle.metrics().transcripts_final, 0);
}
