//! Per-dispatch command envelope.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use crate::command::Command;
use crate::id::{ActorId, RoundId};

/// A value stored in a [`CommandContext`] auxiliary bag.
#[derive(Clone, Debug, PartialEq)]
pub enum BagValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Text(String),
}

impl From<bool> for BagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for BagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for BagValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for BagValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for BagValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A [`Command`] wrapped with its routing metadata.
///
/// Consumed once per dispatch pass. A requeue hands the same context
/// to the next round, where the listener chain restarts from the top;
/// the auxiliary bag is the only state that survives between passes.
#[derive(Clone)]
pub struct CommandContext {
    /// The actor the command is attributed to.
    pub actor: ActorId,
    /// The wrapped command. Shared read-only with every listener.
    pub command: Arc<dyn Command>,
    /// Auxiliary key/value bag, in insertion order.
    pub data: IndexMap<String, BagValue>,
    /// Round this context was captured in. Zero until first captured.
    pub round: RoundId,
    /// When the context was created.
    pub enqueued_at: Instant,
    /// Earliest time the context may be captured into a round.
    pub not_before: Option<Instant>,
    /// How many times a listener has asked for this context to be requeued.
    pub requeue_count: u32,
}

impl CommandContext {
    /// Wrap `command` for `actor`, stamped with the current time.
    pub fn new(actor: ActorId, command: impl Command) -> Self {
        Self::from_arc(actor, Arc::new(command))
    }

    /// Wrap an already-shared command.
    pub fn from_arc(actor: ActorId, command: Arc<dyn Command>) -> Self {
        Self {
            actor,
            command,
            data: IndexMap::new(),
            round: RoundId::default(),
            enqueued_at: Instant::now(),
            not_before: None,
            requeue_count: 0,
        }
    }

    /// Hold the context back until `at` (a delayed command).
    pub fn not_before(mut self, at: Instant) -> Self {
        self.not_before = Some(at);
        self
    }

    /// Routing name of the wrapped command.
    pub fn name(&self) -> &str {
        self.command.name()
    }

    /// The wrapped command as a `T`, if it is one.
    pub fn command_as<T: Command>(&self) -> Option<&T> {
        self.command.downcast_ref::<T>()
    }

    /// Whether the context may be captured at `now`.
    pub fn is_ready_at(&self, now: Instant) -> bool {
        self.not_before.is_none_or(|at| at <= now)
    }

    /// Look up a bag entry.
    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.data.get(key)
    }

    /// Insert or overwrite a bag entry, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<BagValue>) -> Option<BagValue> {
        self.data.insert(key.into(), value.into())
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("actor", &self.actor)
            .field("command", &self.command)
            .field("round", &self.round)
            .field("requeue_count", &self.requeue_count)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
