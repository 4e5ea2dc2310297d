//! The [`World`] service: every pipeline component behind one handle.
//!
//! `World` is constructed once and shared by reference (usually an
//! `Arc`) with producers and consumers. Each component keeps its own
//! lock; no `World` method holds two of them at once.
//!
//! Every consumer step is a plain method, so the world can be driven
//! in lockstep from a test or tool without any threads:
//!
//! ```
//! use std::time::Instant;
//! use hearth_core::{ActorId, Input, RoomKey};
//! use hearth_engine::{EngineConfig, World};
//!
//! let world = World::new(EngineConfig::default()).unwrap();
//! world.presence().join(ActorId(1), RoomKey::new("town", "square"));
//! assert!(world.input_sender().try_send(Input::new(ActorId(1), "look")));
//!
//! world.process_inputs();          // throttle -> PlayerCommand action
//! let now = Instant::now();
//! world.process_tick_at(now);      // action -> game lane
//! let report = world.run_round_at(now);
//! assert_eq!(report.dispatched, 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};

use hearth_core::{
    ActionError, ActionId, ActionType, ActorId, Command, CommandContext, DispatchError, Input,
    ListenResult, Listener, Message, PlayerQuit, RoundId, SubmitError,
};

use crate::actors::Presence;
use crate::balance::BalanceCategory;
use crate::config::{ConfigError, EngineConfig};
use crate::dispatcher::{DispatchOutcome, Dispatcher, FnListener};
use crate::lanes::Lanes;
use crate::metrics::{bump, EngineMetrics, MetricsSnapshot};
use crate::scheduler::{heartbeat, Action, ActionScheduler, SchedulerHost};
use crate::throttle::{InputSender, ThrottleState};

/// Name of the built-in [`PlayerQuit`] listener.
pub const QUIT_LISTENER: &str = "core.quit";

/// Priority of the built-in [`PlayerQuit`] listener.
pub const QUIT_PRIORITY: i32 = 1;

/// Bag key under which the quit listener records the room the actor left.
pub const LEFT_ROOM_KEY: &str = "left_room";

// ── Reports ──────────────────────────────────────────────────────

/// Summary of one captured and dispatched round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// The round stamp.
    pub id: RoundId,
    /// Contexts dispatched.
    pub dispatched: usize,
    /// Chains stopped by `Cancel`.
    pub cancelled: usize,
    /// Contexts resubmitted for the next round.
    pub requeued: usize,
    /// Delayed contexts not yet ready.
    pub deferred: usize,
}

/// Point-in-time view of the whole pipeline.
#[derive(Clone, Debug)]
pub struct WorldStats {
    /// Cumulative counters.
    pub metrics: MetricsSnapshot,
    /// Most recent round stamp.
    pub current_round: RoundId,
    /// System lane depth.
    pub system_queue_len: usize,
    /// Game lane depth.
    pub game_queue_len: usize,
    /// Input channel depth.
    pub input_queue_len: usize,
    /// Pending scheduled actions.
    pub pending_actions: usize,
    /// Scheduler passes so far.
    pub tick_count: u64,
    /// Registered listeners.
    pub listener_count: usize,
    /// Listeners per command name.
    pub bucket_sizes: Vec<(String, usize)>,
    /// Configured ticker period.
    pub tick_interval: Duration,
    /// Actors present.
    pub actors: usize,
}

// ── World ────────────────────────────────────────────────────────

/// The command pipeline as one explicit service.
pub struct World {
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    dispatcher: Dispatcher,
    lanes: Lanes,
    scheduler: ActionScheduler<World>,
    presence: Arc<Presence>,
    input: InputSender,
    input_rx: Receiver<Input>,
    throttle: Mutex<ThrottleState>,
}

impl SchedulerHost for World {
    fn scheduler(&self) -> &ActionScheduler<Self> {
        &self.scheduler
    }
}

impl World {
    /// Validate `config` and build every component.
    ///
    /// Registers the built-in [`QUIT_LISTENER`].
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(EngineMetrics::default());
        let (input_tx, input_rx) = bounded(config.input_queue_capacity);
        let world = Self {
            dispatcher: Dispatcher::with_metrics(Arc::clone(&metrics)),
            lanes: Lanes::new(
                config.system_queue_capacity,
                config.game_queue_capacity,
                config.requeue_limit(),
                Arc::clone(&metrics),
            ),
            scheduler: ActionScheduler::new(Arc::clone(&metrics)),
            presence: Arc::new(Presence::new(config.balance.clone())),
            input: InputSender::new(input_tx, Arc::clone(&metrics)),
            input_rx,
            throttle: Mutex::new(ThrottleState::new(config.max_inputs_per_second)),
            metrics,
            config,
        };
        world
            .dispatcher
            .register(world.quit_listener(), &[PlayerQuit::NAME])?;
        Ok(world)
    }

    fn quit_listener(&self) -> Arc<dyn Listener> {
        let presence = Arc::clone(&self.presence);
        Arc::new(FnListener::typed::<PlayerQuit>(
            QUIT_LISTENER,
            QUIT_PRIORITY,
            move |quit, ctx| {
                if let Some(room) = presence.leave(quit.actor) {
                    ctx.set(LEFT_ROOM_KEY, room.to_string());
                }
                ListenResult::Continue
            },
        ))
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The listener registry.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The system and game lanes.
    pub fn lanes(&self) -> &Lanes {
        &self.lanes
    }

    /// Present actors and room occupancy.
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Shared counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// A producer handle on the input channel.
    pub fn input_sender(&self) -> InputSender {
        self.input.clone()
    }

    pub(crate) fn input_receiver(&self) -> Receiver<Input> {
        self.input_rx.clone()
    }

    // ── Listener registry ────────────────────────────────────────

    /// Register a listener for each of `commands`.
    pub fn register(
        &self,
        listener: Arc<dyn Listener>,
        commands: &[&str],
    ) -> Result<(), DispatchError> {
        self.dispatcher.register(listener, commands)
    }

    /// Register a listener for every command.
    pub fn register_global(&self, listener: Arc<dyn Listener>) -> Result<(), DispatchError> {
        self.dispatcher.register_global(listener)
    }

    /// Remove a listener by name.
    pub fn unregister(&self, name: &str) -> Result<(), DispatchError> {
        self.dispatcher.unregister(name)
    }

    // ── Producers ────────────────────────────────────────────────

    /// Queue `command` on the system lane. Returns `false` if dropped.
    pub fn queue_system(&self, actor: ActorId, command: impl Command) -> bool {
        self.lanes.enqueue_system(CommandContext::new(actor, command))
    }

    /// Queue `command` on the game lane for the next round.
    pub fn queue_game(&self, actor: ActorId, command: impl Command) -> bool {
        self.lanes.enqueue_game(CommandContext::new(actor, command))
    }

    /// Queue `command` on the game lane, held back until `delay` after `now`.
    pub fn queue_game_delayed_at(
        &self,
        now: Instant,
        actor: ActorId,
        command: impl Command,
        delay: Duration,
    ) -> bool {
        self.lanes
            .enqueue_game(CommandContext::new(actor, command).not_before(now + delay))
    }

    /// Queue a delayed game command relative to now.
    pub fn queue_game_delayed(&self, actor: ActorId, command: impl Command, delay: Duration) -> bool {
        self.queue_game_delayed_at(Instant::now(), actor, command, delay)
    }

    /// Submit a line of input with the bounded-wait policy.
    ///
    /// Waits up to the configured enqueue timeout for channel space.
    pub fn handle_input(&self, actor: ActorId, text: impl Into<String>) -> Result<(), SubmitError> {
        self.input
            .send_timeout(Input::new(actor, text), self.config.enqueue_timeout())
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Dispatch one context and resubmit it if a listener asks.
    pub fn dispatch(&self, mut ctx: CommandContext) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(&mut ctx);
        if let DispatchOutcome::Requeue { by } = &outcome {
            tracing::trace!(listener = %by, command = ctx.name(), "requeue requested");
            self.lanes.requeue(ctx);
        }
        outcome
    }

    /// Dispatch everything currently on the system lane.
    pub fn drain_system(&self) -> usize {
        let mut n = 0;
        while let Some(ctx) = self.lanes.try_recv_system() {
            self.dispatch(ctx);
            n += 1;
        }
        n
    }

    /// Capture one round at `now` and dispatch it in capture order.
    pub fn run_round_at(&self, now: Instant) -> RoundReport {
        let round = self.lanes.drain_round_at(now);
        let mut report = RoundReport {
            id: round.id,
            deferred: round.deferred,
            ..RoundReport::default()
        };
        for ctx in round.contexts {
            report.dispatched += 1;
            match self.dispatch(ctx) {
                DispatchOutcome::Completed => {}
                DispatchOutcome::Cancelled { .. } => report.cancelled += 1,
                DispatchOutcome::Requeue { .. } => report.requeued += 1,
            }
        }
        if report.dispatched > 0 {
            tracing::trace!(
                round = %report.id,
                dispatched = report.dispatched,
                requeued = report.requeued,
                "round dispatched"
            );
        }
        report
    }

    /// Capture and dispatch one round now.
    pub fn run_round(&self) -> RoundReport {
        self.run_round_at(Instant::now())
    }

    // ── Input throttle ───────────────────────────────────────────

    fn throttle(&self) -> MutexGuard<'_, ThrottleState> {
        self.throttle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply presence and rate checks to one input.
    ///
    /// Admitted input becomes a zero-delay [`ActionType::PlayerCommand`]
    /// action that moves it onto the game lane. Returns whether the
    /// input was admitted.
    pub fn ingest_input(&self, input: Input) -> bool {
        if !self.presence.contains(input.actor) {
            bump(&self.metrics.unknown_actor_drops);
            tracing::debug!(actor = %input.actor, "input for absent actor dropped");
            return false;
        }
        if !self.throttle().admit(input.actor) {
            bump(&self.metrics.throttled_inputs);
            tracing::debug!(actor = %input.actor, text = %input.text, "input throttled");
            if let Some(feedback) = &self.config.throttle_feedback {
                self.queue_system(input.actor, Message::to_actor(input.actor, feedback.clone()));
            }
            return false;
        }
        let actor = input.actor;
        self.scheduler.schedule(
            ActionType::PlayerCommand,
            Duration::ZERO,
            Some(actor),
            Some(Arc::new(input)),
            player_command,
        );
        true
    }

    /// Ingest everything currently in the input channel.
    pub fn process_inputs(&self) -> usize {
        let mut n = 0;
        while let Ok(input) = self.input_rx.try_recv() {
            self.ingest_input(input);
            n += 1;
        }
        n
    }

    /// Start a new throttle window.
    pub fn reset_throttle(&self) {
        self.throttle().reset();
    }

    // ── Scheduler ────────────────────────────────────────────────

    /// Schedule the recurring heartbeat, first firing `delay` after `now`.
    pub fn schedule_heartbeat_at(&self, now: Instant, delay: Duration) -> ActionId {
        self.scheduler.schedule_at(
            now,
            ActionType::Heartbeat,
            delay,
            None,
            None,
            heartbeat::<World>(self.config.heartbeat_interval()),
        )
    }

    /// Sweep recovered balances, then run every action due at `now`.
    ///
    /// Returns the number of action callbacks invoked.
    pub fn process_tick_at(&self, now: Instant) -> usize {
        self.sweep_balances_at(now);
        self.scheduler.process_tick_at(now, self)
    }

    /// Sweep and run due actions now.
    pub fn process_tick(&self) -> usize {
        self.process_tick_at(Instant::now())
    }

    // ── Balance ──────────────────────────────────────────────────

    /// Clear recovered balances for every present actor and send the
    /// configured recovery messages. Returns the number of messages queued.
    pub fn sweep_balances_at(&self, now: Instant) -> usize {
        self.presence
            .actors()
            .actors()
            .into_iter()
            .map(|actor| self.sweep_actor_at(now, actor))
            .sum()
    }

    fn sweep_actor_at(&self, now: Instant, actor: ActorId) -> usize {
        let Some(ledger) = self.presence.actors().ledger(actor) else {
            return 0;
        };
        let mut sent = 0;
        for category in ledger.sweep_recovered_at(now) {
            if let Some(text) = self.config.balance.recovery_message(category) {
                if self.queue_system(actor, Message::to_actor(actor, text)) {
                    sent += 1;
                }
            }
        }
        sent
    }

    /// Spend `actor`'s balance in `category` and schedule a
    /// [`ActionType::BalanceRestore`] action for the moment it recovers.
    ///
    /// Returns the recovery instant, or `None` if the actor is absent.
    pub fn use_balance_with_restore_at(
        &self,
        now: Instant,
        actor: ActorId,
        category: BalanceCategory,
        duration: Option<Duration>,
    ) -> Option<Instant> {
        let ledger = self.presence.actors().ledger(actor)?;
        let free_at = ledger.use_balance_at(now, category, duration);
        self.scheduler.schedule_at(
            now,
            ActionType::BalanceRestore,
            free_at.saturating_duration_since(now),
            Some(actor),
            None,
            balance_restore,
        );
        Some(free_at)
    }

    /// Spend balance now and schedule its restore.
    pub fn use_balance_with_restore(
        &self,
        actor: ActorId,
        category: BalanceCategory,
        duration: Option<Duration>,
    ) -> Option<Instant> {
        self.use_balance_with_restore_at(Instant::now(), actor, category, duration)
    }

    // ── Introspection ────────────────────────────────────────────

    /// Snapshot counters, queue depths and registry shape.
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            metrics: self.metrics.snapshot(),
            current_round: self.lanes.current_round(),
            system_queue_len: self.lanes.system_len(),
            game_queue_len: self.lanes.game_len(),
            input_queue_len: self.input.len(),
            pending_actions: self.scheduler.len(),
            tick_count: self.scheduler.tick_count(),
            listener_count: self.dispatcher.listener_count(),
            bucket_sizes: self.dispatcher.bucket_sizes(),
            tick_interval: self.config.tick_interval(),
            actors: self.presence.actors().len(),
        }
    }
}

// ── Standard callbacks ───────────────────────────────────────────

fn player_command(action: &Action<World>, world: &World) -> Result<(), ActionError> {
    let input = action.payload_as::<Input>()?;
    if world.queue_game(input.actor, input.clone()) {
        Ok(())
    } else {
        Err(ActionError::failed("game lane full"))
    }
}

fn balance_restore(action: &Action<World>, world: &World) -> Result<(), ActionError> {
    let actor = action.actor.ok_or(ActionError::InvalidPayload {
        expected: "actor id",
    })?;
    world.sweep_actor_at(action.execute_at, actor);
    Ok(())
}
