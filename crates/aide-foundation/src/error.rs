use thiserror::Error;

#[derive(Error, Debug)]
pub enum AideError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Speech output error: {0}")]
    Tts(#[from] TtsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors raised while starting or running a speech capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Speech recognition not authorized")]
    PermissionDenied,

    #[error("Audio session error: {0}")]
    AudioSession(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Command text is empty after trimming")]
    EmptyInput,

    #[error("Dispatcher is no longer running")]
    ChannelClosed,
}

/// Errors from the remote completion endpoint. Every variant carries a
/// human-readable message; the dispatcher surfaces them as the response text.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication rejected by completion endpoint (status {status})")]
    Auth { status: u16 },

    #[error("Completion endpoint error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No response text received from the model")]
    EmptyResponse,
}

/// Errors propagated from the identity provider. Surfaced as display strings,
/// never fatal.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No account exists for {email}")]
    UserNotFound { email: String },

    #[error("An account already exists for {email}")]
    EmailInUse { email: String },

    #[error("Password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Auth service unreachable: {0}")]
    Network(String),
}

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Speech engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
