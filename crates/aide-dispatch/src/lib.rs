//! Command dispatch for aide
//!
//! The core of the assistant: mediates between raw input (speech or typed
//! text) and the remote completion call, and owns the single source of truth
//! for "are we currently listening". Every observable mutation happens inside
//! one event loop, so ordering holds by construction rather than by locking.

pub mod dispatcher;
pub mod metrics;

pub use dispatcher::{
    CaptureState, CommandDispatcher, DispatcherConfig, DispatcherHandle, SessionFactory,
    STATUS_LISTENING, STATUS_NOT_AUTHORIZED, STATUS_READY, STATUS_STOPPED, STATUS_TAP_AGAIN,
};
pub use metrics::DispatchMetrics;
