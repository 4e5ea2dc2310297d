//! Error types shared across the pipeline.

use thiserror::Error;

// ── DispatchError ────────────────────────────────────────────────

/// Errors from listener registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A listener with this name is already registered.
    #[error("listener '{name}' is already registered")]
    DuplicateListener {
        /// The conflicting name.
        name: String,
    },
    /// No listener with this name is registered.
    #[error("listener '{name}' not found")]
    UnknownListener {
        /// The missing name.
        name: String,
    },
}

// ── SubmitError ──────────────────────────────────────────────────

/// Errors from enqueueing work onto a bounded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The channel stayed full for the whole wait.
    #[error("queue full")]
    QueueFull,
    /// The consumer has shut down.
    #[error("consumer has shut down")]
    Shutdown,
}

// ── ActionError ──────────────────────────────────────────────────

/// Errors returned by scheduled action callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The callback ran but could not complete its work.
    #[error("action failed: {reason}")]
    Failed {
        /// Human-readable cause.
        reason: String,
    },
    /// The action's payload was missing or of the wrong type.
    #[error("invalid payload, expected {expected}")]
    InvalidPayload {
        /// The payload type the callback expected.
        expected: &'static str,
    },
}

impl ActionError {
    /// Shorthand for [`ActionError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
