//! Dispatcher metrics

/// Dispatcher counters, cloned out on read.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
    /// Commands appended to the history
    pub commands_submitted: u64,
    /// Partial transcripts received
    pub transcripts_partial: u64,
    /// Final transcripts received
    pub transcripts_final: u64,
    /// Recognition errors received
    pub transcript_errors: u64,
    /// Completions applied successfully
    pub completions_ok: u64,
    /// Completions that failed (still surfaced as response text)
    pub completions_failed: u64,
    /// Completion results dropped because a newer command was dispatched
    pub stale_responses_dropped: u64,
}
