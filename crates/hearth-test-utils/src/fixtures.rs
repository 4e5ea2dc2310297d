//! Reusable listener fixtures.
//!
//! - [`RecordingListener`] logs its own name and returns a fixed result.
//! - [`RequeueingListener`] asks for a requeue a fixed number of times,
//!   then lets the chain continue.

use std::sync::atomic::{AtomicU32, Ordering};

use hearth_core::{CommandContext, ListenResult, Listener};

use crate::CallLog;

/// Appends its name to a [`CallLog`] on every invocation.
pub struct RecordingListener {
    name: String,
    priority: i32,
    result: ListenResult,
    log: CallLog,
}

impl RecordingListener {
    pub fn new(name: impl Into<String>, priority: i32, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            priority,
            result: ListenResult::Continue,
            log: log.clone(),
        }
    }

    /// Return `result` instead of `Continue`.
    pub fn returning(mut self, result: ListenResult) -> Self {
        self.result = result;
        self
    }
}

impl Listener for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handle(&self, _ctx: &mut CommandContext) -> ListenResult {
        self.log.push(self.name.clone());
        self.result
    }
}

/// Returns `CancelRequeue` for the first `times` invocations.
///
/// Each invocation logs `"{name}:{round}"` so tests can see which round
/// a requeued context landed in.
pub struct RequeueingListener {
    name: String,
    priority: i32,
    remaining: AtomicU32,
    log: CallLog,
}

impl RequeueingListener {
    pub fn new(name: impl Into<String>, priority: i32, times: u32, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            priority,
            remaining: AtomicU32::new(times),
            log: log.clone(),
        }
    }
}

impl Listener for RequeueingListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handle(&self, ctx: &mut CommandContext) -> ListenResult {
        self.log.push(format!("{}:{}", self.name, ctx.round));
        let requeue = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if requeue {
            ListenResult::CancelRequeue
        } else {
            ListenResult::Continue
        }
    }
}
