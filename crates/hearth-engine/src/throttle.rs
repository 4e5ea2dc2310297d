//! Inbound input channel and per-actor rate limiting.
//!
//! Connection workers push raw [`Input`] into one bounded channel
//! through an [`InputSender`]. A single consumer drains it, drops input
//! for actors that are no longer present, applies the per-actor
//! [`ThrottleState`], and hands admitted input to the scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};

use hearth_core::{ActorId, Input, SubmitError};

use crate::metrics::{bump, EngineMetrics};

// ── InputSender ──────────────────────────────────────────────────

/// Producer handle on the inbound input channel. Cheap to clone.
#[derive(Clone)]
pub struct InputSender {
    tx: Sender<Input>,
    metrics: Arc<EngineMetrics>,
}

impl InputSender {
    pub(crate) fn new(tx: Sender<Input>, metrics: Arc<EngineMetrics>) -> Self {
        Self { tx, metrics }
    }

    /// Best-effort enqueue. Never blocks; a full channel drops the input
    /// and returns `false`.
    pub fn try_send(&self, input: Input) -> bool {
        match self.tx.try_send(input) {
            Ok(()) => true,
            Err(TrySendError::Full(input)) => {
                bump(&self.metrics.input_drops);
                tracing::warn!(actor = %input.actor, "input dropped, queue full");
                false
            }
            Err(TrySendError::Disconnected(input)) => {
                tracing::debug!(actor = %input.actor, "input dropped, consumer gone");
                false
            }
        }
    }

    /// Bounded-wait enqueue. Blocks up to `timeout` for space, then
    /// fails with [`SubmitError::QueueFull`].
    pub fn send_timeout(&self, input: Input, timeout: Duration) -> Result<(), SubmitError> {
        match self.tx.send_timeout(input, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(input)) => {
                bump(&self.metrics.input_drops);
                tracing::warn!(
                    actor = %input.actor,
                    timeout_ms = timeout.as_millis() as u64,
                    "input queue full after bounded wait"
                );
                Err(SubmitError::QueueFull)
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(SubmitError::Shutdown),
        }
    }

    /// Inputs currently waiting in the channel.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the channel is empty.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

// ── ThrottleState ────────────────────────────────────────────────

/// Per-actor admission counters for the current window.
#[derive(Debug)]
pub struct ThrottleState {
    counts: HashMap<ActorId, u32>,
    max_per_window: u32,
}

impl ThrottleState {
    /// Admit at most `max_per_window` inputs per actor between resets.
    pub fn new(max_per_window: u32) -> Self {
        Self {
            counts: HashMap::new(),
            max_per_window,
        }
    }

    /// Count one input for `actor`. Returns `false` once the actor has
    /// used its allowance for this window.
    pub fn admit(&mut self, actor: ActorId) -> bool {
        let count = self.counts.entry(actor).or_insert(0);
        if *count >= self.max_per_window {
            return false;
        }
        *count += 1;
        true
    }

    /// Start a new window.
    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
