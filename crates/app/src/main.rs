use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use aide_auth::{AuthGateway, InMemoryAuthGateway};
use aide_capture::recognizers::{NoopRecognizer, ScriptedRecognizer};
use aide_capture::{AudioTap, AuthorizationCache, CaptureConfig, CpalAudioTap, Recognizer};
use aide_completion::{CompletionConfig, HttpCompletionClient};
use aide_dispatch::{CommandDispatcher, DispatcherConfig, SessionFactory};
use aide_foundation::Shutdown;
use aide_tts::{EspeakOutput, NullOutput, SpeechOutput};

mod shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum RecognizerKind {
    /// Claim the microphone but produce no transcripts
    Noop,
    /// Produce a canned transcript (demo without a speech backend)
    Scripted,
}

#[derive(Parser, Debug)]
#[command(name = "aide", version, about = "Voice/text assistant")]
struct Cli {
    /// Completion endpoint URL
    #[arg(long, env = "AIDE_ENDPOINT")]
    endpoint: String,

    /// API key for the completion endpoint
    #[arg(long, env = "AIDE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model name sent with each completion request
    #[arg(long, default_value = "gemini-1.5-flash")]
    model: String,

    /// Completion request timeout in seconds
    #[arg(long, default_value_t = 30)]
    completion_timeout_secs: u64,

    /// Capture silence timeout in seconds (0 disables)
    #[arg(long, default_value_t = 8)]
    silence_timeout_secs: u64,

    /// Input device name (default input device when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Display name used for the greeting
    #[arg(long)]
    name: Option<String>,

    /// Speech backend feeding capture sessions
    #[arg(long, value_enum, default_value_t = RecognizerKind::Noop)]
    recognizer: RecognizerKind,

    /// Disable spoken responses
    #[arg(long)]
    no_speech: bool,
}

struct CliSessionFactory {
    device: Option<String>,
    recognizer: RecognizerKind,
}

impl SessionFactory for CliSessionFactory {
    fn tap(&self) -> Box<dyn AudioTap> {
        Box::new(CpalAudioTap::new(self.device.clone()))
    }

    fn recognizer(&self) -> Box<dyn Recognizer> {
        match self.recognizer {
            RecognizerKind::Noop => Box::new(NoopRecognizer::new()),
            RecognizerKind::Scripted => Box::new(ScriptedRecognizer::with_final(
                "this is a scripted demonstration utterance",
            )),
        }
    }
}

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "aide.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    // stdout belongs to the shell; logs go to stderr and the rolling file
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    tracing::info!("Starting aide");

    let auth: Arc<dyn AuthGateway> = Arc::new(InMemoryAuthGateway::new());
    if let Some(name) = &cli.name {
        // local demo account; identity forms are presentation, not core
        auth.sign_up(name, "you@localhost", "local-session")
            .await
            .ok();
    }
    let greeting_name = match auth.current_session().await {
        Some(session) => session.display_name_or_default().to_string(),
        None => "User".to_string(),
    };

    let completion = HttpCompletionClient::new(CompletionConfig {
        endpoint: cli.endpoint.clone(),
        model: cli.model.clone(),
        api_key: cli.api_key.clone(),
        timeout: Duration::from_secs(cli.completion_timeout_secs),
    })
    .context("invalid completion configuration")?;

    let speech: Arc<dyn SpeechOutput> = if cli.no_speech {
        Arc::new(NullOutput::new())
    } else {
        match EspeakOutput::discover().await {
            Ok(espeak) => Arc::new(espeak),
            Err(e) => {
                tracing::warn!("Speech output unavailable: {e}; responses will only be displayed");
                Arc::new(NullOutput::new())
            }
        }
    };

    let capture = CaptureConfig {
        silence_timeout: (cli.silence_timeout_secs > 0)
            .then(|| Duration::from_secs(cli.silence_timeout_secs)),
        ..Default::default()
    };

    let (dispatcher, handle) = CommandDispatcher::new(
        Box::new(CliSessionFactory {
            device: cli.device.clone(),
            recognizer: cli.recognizer,
        }),
        AuthorizationCache::granted(),
        Arc::new(completion),
        speech,
        DispatcherConfig { capture },
    );
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let shutdown = Shutdown::new();
    shutdown.install_signal_handler();

    shell::run(handle.clone(), auth, &greeting_name, shutdown.token()).await?;

    let _ = handle.shutdown().await;
    let _ = dispatcher_task.await;
    tracing::info!("aide exited cleanly");
    Ok(())
}
