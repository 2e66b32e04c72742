//! Error types.
//!
//! Two classes of failure exist in this crate, and they are handled very
//! differently:
//!
//! - Recoverable failures are returned as [`TrackerError`]. These are either
//!   allocation failures while enlarging a registry (which always happen
//!   *before* the caller acquires the resource) or failures reported by a
//!   collaborator while releasing.
//!
//! - Internal-consistency failures (forgetting a handle that was never
//!   remembered, deleting an owner that still holds references, using an
//!   owner after it was deleted, and so on) are bugs in the caller. They are
//!   raised as panics, the same way a backend `ERROR` crosses Rust frames, and
//!   must not be caught and retried.

use crate::handle::ResourceKind;
use crate::release::ReleasePhase;
use std::collections::TryReserveError;
use thiserror::Error;
use tracing_error::SpanTrace;

/// The error type collaborators and release callbacks report failures with.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = TrackerError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Backing storage for a registry could not be grown.
    #[error("out of memory while enlarging {kind} array to {requested} entries")]
    OutOfMemory {
        kind: ResourceKind,
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    /// A collaborator failed to release one tracked handle. The handle is
    /// still recorded by its owner.
    #[error("could not release {kind} {handle} of resource owner \"{owner}\"")]
    Release {
        kind: ResourceKind,
        owner: String,
        handle: String,
        source: CollaboratorError,
        context: SpanTrace,
    },

    #[error("could not release locks of resource owner \"{owner}\"")]
    Locks { owner: String, source: CollaboratorError, context: SpanTrace },

    #[error("index scan cleanup failed")]
    IndexScanCleanup { source: CollaboratorError, context: SpanTrace },

    #[error("resource release callback failed during {phase} phase")]
    Callback { phase: ReleasePhase, source: CollaboratorError, context: SpanTrace },

    #[error("invalid tracker configuration: {0}")]
    Config(String),

    #[error("could not parse tracker configuration")]
    ConfigParse(#[from] serde_json::Error),
}

impl TrackerError {
    /// The span trace captured where a collaborator failed, if any.
    pub fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            TrackerError::Release { context, .. }
            | TrackerError::Locks { context, .. }
            | TrackerError::IndexScanCleanup { context, .. }
            | TrackerError::Callback { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Report an internal-consistency failure and abort the current operation.
///
/// The message is logged at `error` level before panicking, so it shows up
/// in the server log even if something up the stack swallows the panic.
macro_rules! internal_error {
    ($($arg:tt)+) => {{
        let message = ::std::format!($($arg)+);
        ::tracing::error!(target: "resowner", "{}", message);
        ::std::panic!("{}", message)
    }};
}
pub(crate) use internal_error;
