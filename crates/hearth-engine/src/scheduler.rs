//! Time- and priority-ordered action scheduler.
//!
//! [`ActionScheduler`] keeps a binary min-heap of [`Action`]s keyed by
//! `(execute_at, priority, sequence)`. The heap root is always the
//! earliest action, lowest priority value first on equal times, oldest
//! first on equal priority.
//!
//! [`process_tick_at`](ActionScheduler::process_tick_at) pops ready
//! actions one at a time and invokes each callback with the heap lock
//! released, so a callback may schedule further actions (including
//! re-scheduling itself) without deadlocking. Anything scheduled during
//! a pass waits for the next pass even if it is already due.

use std::any::{type_name, Any};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use hearth_core::{ActionError, ActionId, ActionType, ActorId};

use crate::metrics::{bump, EngineMetrics};

/// Opaque action payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Callback invoked with the action and the world handle.
pub type ActionCallback<W> = Arc<dyn Fn(&Action<W>, &W) -> Result<(), ActionError> + Send + Sync>;

// ── Action ───────────────────────────────────────────────────────

/// A scheduled callback unit.
///
/// Actions are one-shot. Recurrence is a callback that re-schedules
/// itself (see [`ActionScheduler::reschedule`]).
pub struct Action<W> {
    /// Assigned by the scheduler at push time.
    pub id: ActionId,
    /// Type tag. Determines `priority`.
    pub kind: ActionType,
    /// Earliest time the callback may run.
    pub execute_at: Instant,
    /// Tie-break on equal `execute_at`. Lower runs first.
    pub priority: i32,
    /// Actor the action concerns, if any.
    pub actor: Option<ActorId>,
    /// Opaque data for the callback.
    pub payload: Option<Payload>,
    callback: ActionCallback<W>,
}

impl<W> Action<W> {
    /// The payload as a `T`, or [`ActionError::InvalidPayload`].
    pub fn payload_as<T: Any>(&self) -> Result<&T, ActionError> {
        self.payload
            .as_deref()
            .and_then(|p| p.downcast_ref::<T>())
            .ok_or(ActionError::InvalidPayload {
                expected: type_name::<T>(),
            })
    }

    fn key(&self) -> (Instant, i32, u64) {
        (self.execute_at, self.priority, self.id.0)
    }
}

impl<W> fmt::Debug for Action<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("execute_at", &self.execute_at)
            .field("priority", &self.priority)
            .field("actor", &self.actor)
            .field("has_payload", &self.payload.is_some())
            .finish_non_exhaustive()
    }
}

impl<W> PartialEq for Action<W> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<W> Eq for Action<W> {}

impl<W> PartialOrd for Action<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<W> Ord for Action<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

// ── ActionScheduler ──────────────────────────────────────────────

struct SchedulerState<W> {
    heap: BinaryHeap<Reverse<Action<W>>>,
    next_id: u64,
    tick_count: u64,
}

/// Mutex-guarded action heap for a world of type `W`.
///
/// `schedule*` may be called from any thread. `process_tick*` is meant
/// to run on one dedicated thread.
pub struct ActionScheduler<W> {
    state: Mutex<SchedulerState<W>>,
    metrics: Arc<EngineMetrics>,
}

impl<W> Default for ActionScheduler<W> {
    fn default() -> Self {
        Self::new(Arc::new(EngineMetrics::default()))
    }
}

impl<W> ActionScheduler<W> {
    /// An empty scheduler reporting into `metrics`.
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                heap: BinaryHeap::new(),
                next_id: 1,
                tick_count: 0,
            }),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(
        &self,
        kind: ActionType,
        execute_at: Instant,
        actor: Option<ActorId>,
        payload: Option<Payload>,
        callback: ActionCallback<W>,
    ) -> ActionId {
        let mut st = self.lock();
        let id = ActionId(st.next_id);
        st.next_id += 1;
        st.heap.push(Reverse(Action {
            id,
            kind,
            execute_at,
            priority: kind.priority(),
            actor,
            payload,
            callback,
        }));
        drop(st);
        tracing::trace!(%id, %kind, "action scheduled");
        id
    }

    /// Schedule `callback` to run `delay` after `now`.
    pub fn schedule_at(
        &self,
        now: Instant,
        kind: ActionType,
        delay: Duration,
        actor: Option<ActorId>,
        payload: Option<Payload>,
        callback: impl Fn(&Action<W>, &W) -> Result<(), ActionError> + Send + Sync + 'static,
    ) -> ActionId {
        self.push(kind, now + delay, actor, payload, Arc::new(callback))
    }

    /// Schedule `callback` to run `delay` from now.
    pub fn schedule(
        &self,
        kind: ActionType,
        delay: Duration,
        actor: Option<ActorId>,
        payload: Option<Payload>,
        callback: impl Fn(&Action<W>, &W) -> Result<(), ActionError> + Send + Sync + 'static,
    ) -> ActionId {
        self.schedule_at(Instant::now(), kind, delay, actor, payload, callback)
    }

    /// Schedule a copy of `action` (same type, actor, payload and
    /// callback) to run `delay` after `now`.
    pub fn reschedule_at(&self, now: Instant, action: &Action<W>, delay: Duration) -> ActionId {
        self.push(
            action.kind,
            now + delay,
            action.actor,
            action.payload.clone(),
            Arc::clone(&action.callback),
        )
    }

    /// Schedule a copy of `action` to run `delay` from now.
    pub fn reschedule(&self, action: &Action<W>, delay: Duration) -> ActionId {
        self.reschedule_at(Instant::now(), action, delay)
    }

    /// Run every action due at `now` that was scheduled before this call.
    ///
    /// Callback errors and panics are logged and counted; they never stop
    /// the pass. Returns the number of callbacks invoked.
    pub fn process_tick_at(&self, now: Instant, world: &W) -> usize {
        let watermark = {
            let mut st = self.lock();
            st.tick_count += 1;
            st.next_id
        };
        bump(&self.metrics.ticks);

        let mut deferred = Vec::new();
        let mut executed = 0;
        loop {
            let next = {
                let mut st = self.lock();
                let mut found = None;
                while st
                    .heap
                    .peek()
                    .is_some_and(|Reverse(a)| a.execute_at <= now)
                {
                    let Some(Reverse(action)) = st.heap.pop() else {
                        break;
                    };
                    if action.id.0 >= watermark {
                        deferred.push(action);
                    } else {
                        found = Some(action);
                        break;
                    }
                }
                found
            };
            let Some(action) = next else {
                break;
            };

            executed += 1;
            bump(&self.metrics.actions_executed);
            match catch_unwind(AssertUnwindSafe(|| (action.callback)(&action, world))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    bump(&self.metrics.action_failures);
                    tracing::error!(
                        id = %action.id,
                        kind = %action.kind,
                        actor = ?action.actor,
                        error = %err,
                        "action callback failed"
                    );
                }
                Err(_) => {
                    bump(&self.metrics.action_failures);
                    tracing::error!(
                        id = %action.id,
                        kind = %action.kind,
                        actor = ?action.actor,
                        "action callback panicked"
                    );
                }
            }
        }

        if !deferred.is_empty() {
            self.lock().heap.extend(deferred.into_iter().map(Reverse));
        }
        executed
    }

    /// Run every action due now.
    pub fn process_tick(&self, world: &W) -> usize {
        self.process_tick_at(Instant::now(), world)
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Whether no actions are pending.
    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Number of `process_tick` passes so far.
    pub fn tick_count(&self) -> u64 {
        self.lock().tick_count
    }

    /// `(id, kind, execute_at)` of the heap root.
    pub fn next_due(&self) -> Option<(ActionId, ActionType, Instant)> {
        self.lock()
            .heap
            .peek()
            .map(|Reverse(a)| (a.id, a.kind, a.execute_at))
    }

    /// `(id, execute_at)` of every pending action of type `kind`, earliest
    /// first.
    pub fn pending_of(&self, kind: ActionType) -> Vec<(ActionId, Instant)> {
        let st = self.lock();
        let mut found: Vec<&Action<W>> = st
            .heap
            .iter()
            .map(|Reverse(a)| a)
            .filter(|a| a.kind == kind)
            .collect();
        found.sort();
        found.iter().map(|a| (a.id, a.execute_at)).collect()
    }
}

// ── Standard callbacks ───────────────────────────────────────────

/// A world that owns an [`ActionScheduler`] over itself.
pub trait SchedulerHost: Sized {
    /// The world's scheduler.
    fn scheduler(&self) -> &ActionScheduler<Self>;
}

/// Callback for a heartbeat that re-schedules itself every `interval`.
pub fn heartbeat<W: SchedulerHost>(
    interval: Duration,
) -> impl Fn(&Action<W>, &W) -> Result<(), ActionError> + Send + Sync + 'static {
    move |action, world| {
        let next = world.scheduler().reschedule(action, interval);
        tracing::trace!(id = %action.id, %next, "heartbeat");
        Ok(())
    }
}
