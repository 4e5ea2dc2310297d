//! Priority-ordered listener registry and command dispatch.
//!
//! Listeners are registered against one or more command names, or into
//! the wildcard bucket that sees every command. Each bucket is kept
//! sorted ascending by priority at insertion time, stable on ties by
//! registration order, so dispatch only has to merge two sorted runs.
//!
//! The registry sits behind one `RwLock`. Dispatch snapshots the merged
//! chain under the read lock and releases it before invoking any
//! listener, so a listener may register or unregister others without
//! deadlocking. Such changes take effect from the next dispatch.

use std::any::type_name;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use hearth_core::{Command, CommandContext, DispatchError, ListenResult, Listener};

use crate::metrics::{bump, EngineMetrics};

/// Bucket key reserved for listeners invoked on every command.
pub const WILDCARD: &str = "+";

type Chain = SmallVec<[Arc<dyn Listener>; 8]>;

#[derive(Clone)]
struct Entry {
    listener: Arc<dyn Listener>,
    priority: i32,
}

#[derive(Default)]
struct Registry {
    /// Every registered listener by its own name.
    by_name: IndexMap<String, Arc<dyn Listener>>,
    /// Command name to sorted bucket. Includes [`WILDCARD`].
    buckets: IndexMap<String, Vec<Entry>>,
}

impl Registry {
    fn insert_sorted(&mut self, key: &str, listener: &Arc<dyn Listener>) {
        let priority = listener.priority();
        let bucket = self.buckets.entry(key.to_owned()).or_default();
        let at = bucket.partition_point(|e| e.priority <= priority);
        bucket.insert(
            at,
            Entry {
                listener: Arc::clone(listener),
                priority,
            },
        );
    }

    fn chain_for(&self, command: &str) -> Chain {
        let named = self.buckets.get(command).map(Vec::as_slice).unwrap_or(&[]);
        let global = match command {
            WILDCARD => &[][..],
            _ => self.buckets.get(WILDCARD).map(Vec::as_slice).unwrap_or(&[]),
        };

        let mut chain = Chain::with_capacity(named.len() + global.len());
        let (mut i, mut j) = (0, 0);
        while i < named.len() && j < global.len() {
            // Per-name listeners win ties against wildcard listeners.
            if named[i].priority <= global[j].priority {
                chain.push(Arc::clone(&named[i].listener));
                i += 1;
            } else {
                chain.push(Arc::clone(&global[j].listener));
                j += 1;
            }
        }
        chain.extend(named[i..].iter().map(|e| Arc::clone(&e.listener)));
        chain.extend(global[j..].iter().map(|e| Arc::clone(&e.listener)));
        chain
    }
}

// ── DispatchOutcome ──────────────────────────────────────────────

/// How a dispatch pass ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every listener returned `Continue` (or the chain was empty).
    Completed,
    /// A listener returned `Cancel`.
    Cancelled {
        /// Name of the cancelling listener.
        by: String,
    },
    /// A listener returned `CancelRequeue`; the caller should resubmit
    /// the context into the next round.
    Requeue {
        /// Name of the requeueing listener.
        by: String,
    },
}

// ── Dispatcher ───────────────────────────────────────────────────

/// The event bus: a listener registry plus the dispatch routine.
pub struct Dispatcher {
    registry: RwLock<Registry>,
    metrics: Arc<EngineMetrics>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// An empty dispatcher with its own metrics.
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(EngineMetrics::default()))
    }

    /// An empty dispatcher reporting into shared metrics.
    pub fn with_metrics(metrics: Arc<EngineMetrics>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            metrics,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` for each of `commands`.
    ///
    /// The listener is recorded under its own name for later removal.
    /// Repeated names in `commands` register it once. Fails if a listener
    /// with the same name is already registered.
    pub fn register(
        &self,
        listener: Arc<dyn Listener>,
        commands: &[&str],
    ) -> Result<(), DispatchError> {
        let name = listener.name().to_owned();
        let mut reg = self.write();
        if reg.by_name.contains_key(&name) {
            return Err(DispatchError::DuplicateListener { name });
        }
        let unique: IndexSet<&str> = commands.iter().copied().collect();
        for command in unique {
            reg.insert_sorted(command, &listener);
        }
        tracing::debug!(
            listener = %name,
            priority = listener.priority(),
            commands = ?commands,
            "listener registered"
        );
        reg.by_name.insert(name, listener);
        Ok(())
    }

    /// Register `listener` into the wildcard bucket.
    pub fn register_global(&self, listener: Arc<dyn Listener>) -> Result<(), DispatchError> {
        self.register(listener, &[WILDCARD])
    }

    /// Remove a listener from the registry and from every bucket.
    ///
    /// Buckets left empty are deleted.
    pub fn unregister(&self, name: &str) -> Result<(), DispatchError> {
        let mut reg = self.write();
        if reg.by_name.shift_remove(name).is_none() {
            return Err(DispatchError::UnknownListener {
                name: name.to_owned(),
            });
        }
        reg.buckets.retain(|_, bucket| {
            bucket.retain(|e| e.listener.name() != name);
            !bucket.is_empty()
        });
        tracing::debug!(listener = %name, "listener unregistered");
        Ok(())
    }

    /// Whether a listener named `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.read().by_name.contains_key(name)
    }

    /// Run `ctx` through its merged listener chain.
    ///
    /// A panicking listener is logged and treated as `Continue`.
    pub fn dispatch(&self, ctx: &mut CommandContext) -> DispatchOutcome {
        let chain = self.read().chain_for(ctx.name());
        bump(&self.metrics.commands_dispatched);

        for listener in chain {
            bump(&self.metrics.listeners_invoked);
            let result = match catch_unwind(AssertUnwindSafe(|| listener.handle(ctx))) {
                Ok(result) => result,
                Err(_) => {
                    bump(&self.metrics.listener_panics);
                    tracing::error!(
                        listener = listener.name(),
                        command = ctx.name(),
                        actor = %ctx.actor,
                        "listener panicked, continuing chain"
                    );
                    ListenResult::Continue
                }
            };
            match result {
                ListenResult::Continue => {}
                ListenResult::Cancel => {
                    bump(&self.metrics.cancels);
                    return DispatchOutcome::Cancelled {
                        by: listener.name().to_owned(),
                    };
                }
                ListenResult::CancelRequeue => {
                    return DispatchOutcome::Requeue {
                        by: listener.name().to_owned(),
                    };
                }
            }
        }
        DispatchOutcome::Completed
    }

    /// Listener names in the order a `command` dispatch would invoke them,
    /// wildcard listeners included.
    pub fn listeners_for(&self, command: &str) -> Vec<String> {
        self.read()
            .chain_for(command)
            .iter()
            .map(|l| l.name().to_owned())
            .collect()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.read().by_name.len()
    }

    /// `(command, listener count)` for every non-empty bucket, in
    /// first-registration order.
    pub fn bucket_sizes(&self) -> Vec<(String, usize)> {
        self.read()
            .buckets
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }

    #[cfg(test)]
    fn bucket_priorities(&self, command: &str) -> Vec<i32> {
        self.read()
            .buckets
            .get(command)
            .map(|b| b.iter().map(|e| e.priority).collect())
            .unwrap_or_default()
    }
}

// ── FnListener ───────────────────────────────────────────────────

type Handler = Box<dyn Fn(&mut CommandContext) -> ListenResult + Send + Sync>;

/// A [`Listener`] backed by a closure.
pub struct FnListener {
    name: String,
    priority: i32,
    handler: Handler,
}

impl FnListener {
    /// Wrap a closure that sees every context it is dispatched.
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        handler: impl Fn(&mut CommandContext) -> ListenResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            handler: Box::new(handler),
        }
    }

    /// Wrap a closure that expects the command to be a `C`.
    ///
    /// A context carrying any other command shape is logged and skipped
    /// with `Continue`; the rest of the chain still runs.
    pub fn typed<C: Command>(
        name: impl Into<String>,
        priority: i32,
        handler: impl Fn(&C, &mut CommandContext) -> ListenResult + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let label = name.clone();
        Self::new(name, priority, move |ctx| {
            let command = Arc::clone(&ctx.command);
            match command.downcast_ref::<C>() {
                Some(cmd) => handler(cmd, ctx),
                None => {
                    tracing::error!(
                        listener = %label,
                        expected = type_name::<C>(),
                        actual = command.name(),
                        "listener received unexpected command type"
                    );
                    ListenResult::Continue
                }
            }
        })
    }
}

impl Listener for FnListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handle(&self, ctx: &mut CommandContext) -> ListenResult {
        (self.handler)(ctx)
    }
}

impl std::fmt::Debug for FnListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{ActorId, Input, PlayerQuit};
    use hearth_test_utils::{CallLog, Probe, RecordingListener};

    fn probe_ctx(name: &str) -> CommandContext {
        CommandContext::new(ActorId(1), Probe::named(name))
    }

    fn recorder(name: &str, priority: i32, log: &CallLog) -> Arc<dyn Listener> {
        Arc::new(RecordingListener::new(name, priority, log))
    }

    #[test]
    fn chain_runs_in_priority_order() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("c", 30, &log), &["look"]).unwrap();
        d.register(recorder("a", 10, &log), &["look"]).unwrap();
        d.register(recorder("b", 20, &log), &["look"]).unwrap();

        let outcome = d.dispatch(&mut probe_ctx("look"));
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(log.entries(), ["a", "b", "c"]);
    }

    #[test]
    fn repeated_command_names_register_once() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("parser", 10, &log), &["look", "look", "say"])
            .unwrap();

        d.dispatch(&mut probe_ctx("look"));
        assert_eq!(log.entries(), ["parser"]);
        assert_eq!(d.listeners_for("look").len(), 1);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        for name in ["first", "second", "third"] {
            d.register(recorder(name, 5, &log), &["look"]).unwrap();
        }
        d.dispatch(&mut probe_ctx("look"));
        assert_eq!(log.entries(), ["first", "second", "third"]);
    }

    #[test]
    fn cancel_stops_chain() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("one", 1, &log), &["look"]).unwrap();
        d.register(
            Arc::new(RecordingListener::new("two", 2, &log).returning(ListenResult::Cancel)),
            &["look"],
        )
        .unwrap();
        d.register(recorder("three", 3, &log), &["look"]).unwrap();

        let outcome = d.dispatch(&mut probe_ctx("look"));
        assert_eq!(outcome, DispatchOutcome::Cancelled { by: "two".into() });
        assert_eq!(log.entries(), ["one", "two"]);
    }

    #[test]
    fn cancel_requeue_reports_requeue() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(
            Arc::new(
                RecordingListener::new("gate", 1, &log).returning(ListenResult::CancelRequeue),
            ),
            &["look"],
        )
        .unwrap();
        d.register(recorder("after", 2, &log), &["look"]).unwrap();

        let outcome = d.dispatch(&mut probe_ctx("look"));
        assert_eq!(outcome, DispatchOutcome::Requeue { by: "gate".into() });
        assert_eq!(log.entries(), ["gate"]);
    }

    #[test]
    fn wildcard_listeners_merge_by_priority() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("named-5", 5, &log), &["look"]).unwrap();
        d.register(recorder("named-20", 20, &log), &["look"]).unwrap();
        d.register_global(recorder("global-5", 5, &log)).unwrap();
        d.register_global(recorder("global-10", 10, &log)).unwrap();

        d.dispatch(&mut probe_ctx("look"));
        assert_eq!(log.entries(), ["named-5", "global-5", "global-10", "named-20"]);

        log.clear();
        d.dispatch(&mut probe_ctx("other"));
        assert_eq!(log.entries(), ["global-5", "global-10"]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("x", 1, &log), &["a"]).unwrap();
        let err = d.register(recorder("x", 2, &log), &["b"]).unwrap_err();
        assert_eq!(err, DispatchError::DuplicateListener { name: "x".into() });
        assert_eq!(d.listener_count(), 1);
        assert!(d.listeners_for("b").is_empty());
    }

    #[test]
    fn unregister_removes_from_every_bucket() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("multi", 1, &log), &["a", "b"]).unwrap();
        d.register(recorder("keep", 2, &log), &["b"]).unwrap();

        d.unregister("multi").unwrap();
        assert!(!d.is_registered("multi"));
        assert_eq!(d.bucket_sizes(), [("b".to_string(), 1)]);
        assert_eq!(d.listeners_for("b"), ["keep"]);
    }

    #[test]
    fn unregister_unknown_is_error() {
        let d = Dispatcher::new();
        assert_eq!(
            d.unregister("ghost"),
            Err(DispatchError::UnknownListener {
                name: "ghost".into()
            })
        );
    }

    #[test]
    fn panicking_listener_is_skipped() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(
            Arc::new(FnListener::new("boom", 1, |_| panic!("listener bug"))),
            &["look"],
        )
        .unwrap();
        d.register(recorder("after", 2, &log), &["look"]).unwrap();

        assert_eq!(d.dispatch(&mut probe_ctx("look")), DispatchOutcome::Completed);
        assert_eq!(log.entries(), ["after"]);
        assert_eq!(d.metrics.snapshot().listener_panics, 1);
    }

    #[test]
    fn typed_listener_skips_mismatched_command() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        let seen = log.clone();
        // Registered for the Input name but receives a PlayerQuit.
        d.register(
            Arc::new(FnListener::typed::<Input>("typed", 1, move |input, _| {
                seen.push(input.text.clone());
                ListenResult::Cancel
            })),
            &[Input::NAME, PlayerQuit::NAME],
        )
        .unwrap();
        d.register(recorder("after", 2, &log), &[PlayerQuit::NAME]).unwrap();

        let mut quit = CommandContext::new(ActorId(1), PlayerQuit { actor: ActorId(1) });
        assert_eq!(d.dispatch(&mut quit), DispatchOutcome::Completed);
        assert_eq!(log.entries(), ["after"]);

        let mut input = CommandContext::new(ActorId(1), Input::new(ActorId(1), "hello"));
        assert_eq!(
            d.dispatch(&mut input),
            DispatchOutcome::Cancelled { by: "typed".into() }
        );
        assert_eq!(log.entries(), ["after", "hello"]);
    }

    #[test]
    fn listener_may_unregister_during_dispatch() {
        let d = Arc::new(Dispatcher::new());
        let handle = Arc::clone(&d);
        d.register(
            Arc::new(FnListener::new("once", 1, move |_| {
                let _ = handle.unregister("once");
                ListenResult::Continue
            })),
            &["look"],
        )
        .unwrap();
        d.dispatch(&mut probe_ctx("look"));
        assert!(!d.is_registered("once"));
    }

    #[test]
    fn metrics_count_dispatches_and_cancels() {
        let d = Dispatcher::new();
        let log = CallLog::new();
        d.register(recorder("a", 1, &log), &["look"]).unwrap();
        d.register(
            Arc::new(RecordingListener::new("b", 2, &log).returning(ListenResult::Cancel)),
            &["look"],
        )
        .unwrap();
        d.dispatch(&mut probe_ctx("look"));
        d.dispatch(&mut probe_ctx("none"));
        let m = d.metrics.snapshot();
        assert_eq!(m.commands_dispatched, 2);
        assert_eq!(m.listeners_invoked, 2);
        assert_eq!(m.cancels, 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Register { id: u8, priority: i8, buckets: Vec<u8> },
            Unregister { id: u8 },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..12, any::<i8>(), prop::collection::vec(0u8..4, 0..4)).prop_map(
                    |(id, priority, buckets)| Op::Register {
                        id,
                        priority,
                        buckets
                    }
                ),
                (0u8..12).prop_map(|id| Op::Unregister { id }),
            ]
        }

        proptest! {
            #[test]
            fn buckets_stay_sorted(ops in prop::collection::vec(op(), 0..64)) {
                let d = Dispatcher::new();
                let log = CallLog::new();
                let keys = ["a", "b", "c", WILDCARD];
                for op in ops {
                    match op {
                        Op::Register { id, priority, mut buckets } => {
                            buckets.sort_unstable();
                            buckets.dedup();
                            let cmds: Vec<&str> =
                                buckets.iter().map(|b| keys[*b as usize]).collect();
                            let _ = d.register(
                                recorder(&format!("l{id}"), i32::from(priority), &log),
                                &cmds,
                            );
                        }
                        Op::Unregister { id } => {
                            let _ = d.unregister(&format!("l{id}"));
                        }
                    }
                    for key in keys {
                        let prios = d.bucket_priorities(key);
                        prop_assert!(prios.windows(2).all(|w| w[0] <= w[1]));
                    }
                    for (_, size) in d.bucket_sizes() {
                        prop_assert!(size > 0);
                    }
                }
            }
        }
    }
}
