//! Cumulative pipeline counters.
//!
//! [`EngineMetrics`] is shared by every loop and updated with relaxed
//! atomics; [`snapshot()`](EngineMetrics::snapshot) copies it into a
//! plain [`MetricsSnapshot`] for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters. One instance per [`World`](crate::World).
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub(crate) commands_dispatched: AtomicU64,
    pub(crate) listeners_invoked: AtomicU64,
    pub(crate) cancels: AtomicU64,
    pub(crate) requeues: AtomicU64,
    pub(crate) requeue_drops: AtomicU64,
    pub(crate) listener_panics: AtomicU64,
    pub(crate) system_lane_drops: AtomicU64,
    pub(crate) game_lane_drops: AtomicU64,
    pub(crate) input_drops: AtomicU64,
    pub(crate) throttled_inputs: AtomicU64,
    pub(crate) unknown_actor_drops: AtomicU64,
    pub(crate) actions_executed: AtomicU64,
    pub(crate) action_failures: AtomicU64,
    pub(crate) rounds: AtomicU64,
    pub(crate) ticks: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineMetrics {
    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            commands_dispatched: load(&self.commands_dispatched),
            listeners_invoked: load(&self.listeners_invoked),
            cancels: load(&self.cancels),
            requeues: load(&self.requeues),
            requeue_drops: load(&self.requeue_drops),
            listener_panics: load(&self.listener_panics),
            system_lane_drops: load(&self.system_lane_drops),
            game_lane_drops: load(&self.game_lane_drops),
            input_drops: load(&self.input_drops),
            throttled_inputs: load(&self.throttled_inputs),
            unknown_actor_drops: load(&self.unknown_actor_drops),
            actions_executed: load(&self.actions_executed),
            action_failures: load(&self.action_failures),
            rounds: load(&self.rounds),
            ticks: load(&self.ticks),
        }
    }
}

/// Point-in-time copy of [`EngineMetrics`]. All values are cumulative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Contexts that went through a dispatch pass.
    pub commands_dispatched: u64,
    /// Individual listener invocations.
    pub listeners_invoked: u64,
    /// Chains stopped by `Cancel`.
    pub cancels: u64,
    /// Contexts resubmitted by `CancelRequeue`.
    pub requeues: u64,
    /// Contexts dropped for exceeding the requeue bound or finding the lane full.
    pub requeue_drops: u64,
    /// Listener invocations that panicked.
    pub listener_panics: u64,
    /// Commands dropped because the system lane was full.
    pub system_lane_drops: u64,
    /// Commands dropped because the game lane was full.
    pub game_lane_drops: u64,
    /// Inputs dropped because the input channel was full.
    pub input_drops: u64,
    /// Inputs dropped by the per-actor rate limit.
    pub throttled_inputs: u64,
    /// Inputs dropped because the actor was not present.
    pub unknown_actor_drops: u64,
    /// Scheduled action callbacks invoked.
    pub actions_executed: u64,
    /// Action callbacks that returned an error or panicked.
    pub action_failures: u64,
    /// Rounds captured on the game lane.
    pub rounds: u64,
    /// Scheduler passes.
    pub ticks: u64,
}
