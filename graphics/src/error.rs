//! Graphics error types.

use std::fmt;

/// Device-level errors raised while recording or submitting GPU work.
///
/// Modeling mistakes in a graph (double-bound targets, writes to read-only
/// resources, stale handles) are logged and ignored instead; only failures
/// that make the recorded command stream unusable end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// The resource state is locked and cannot be transitioned.
    StateLocked(String),
    /// A command context was used after it was closed.
    ContextClosed,
    /// The GPU device was lost.
    DeviceLost,
    /// Recording a pass failed.
    PassFailed {
        /// Name of the pass whose callback failed.
        pass: String,
        /// Failure reported by the callback.
        message: String,
    },
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::StateLocked(name) => write!(f, "state of resource '{name}' is locked"),
            Self::ContextClosed => write!(f, "command context is closed"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::PassFailed { pass, message } => {
                write!(f, "pass '{pass}' failed: {message}")
            }
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}
