//! Dual-lane command queues.
//!
//! The system lane is drained continuously by its own loop and is never
//! throttled. The game lane is drained once per tick into a [`Round`]:
//! everything captured in one drain is stamped with the same
//! [`RoundId`] and dispatched in capture order.
//!
//! Both lanes are bounded crossbeam channels. Producers never block:
//! a full lane drops the context with a `warn` and a metrics bump.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use hearth_core::{CommandContext, RoundId};

use crate::metrics::{bump, EngineMetrics};

/// Which lane a context travels on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Immediate, unthrottled.
    System,
    /// Round-batched at tick cadence.
    Game,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Game => f.write_str("game"),
        }
    }
}

/// The batch of game-lane contexts captured by one drain.
#[derive(Debug)]
pub struct Round {
    /// The stamp shared by every context in the batch.
    pub id: RoundId,
    /// Captured contexts, in capture order.
    pub contexts: Vec<CommandContext>,
    /// Delayed contexts that were not yet ready and went back to the tail.
    pub deferred: usize,
}

/// The system and game lanes plus the round counter.
pub struct Lanes {
    system_tx: Sender<CommandContext>,
    system_rx: Receiver<CommandContext>,
    game_tx: Sender<CommandContext>,
    game_rx: Receiver<CommandContext>,
    round: AtomicU64,
    requeue_limit: Option<u32>,
    metrics: Arc<EngineMetrics>,
}

impl Lanes {
    /// Create both lanes with the given capacities.
    ///
    /// `requeue_limit` bounds how many times one context may be
    /// requeued; `None` leaves it unbounded.
    pub fn new(
        system_capacity: usize,
        game_capacity: usize,
        requeue_limit: Option<u32>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let (system_tx, system_rx) = bounded(system_capacity);
        let (game_tx, game_rx) = bounded(game_capacity);
        Self {
            system_tx,
            system_rx,
            game_tx,
            game_rx,
            round: AtomicU64::new(0),
            requeue_limit,
            metrics,
        }
    }

    fn try_push(&self, lane: Lane, ctx: CommandContext) -> bool {
        let (tx, drops) = match lane {
            Lane::System => (&self.system_tx, &self.metrics.system_lane_drops),
            Lane::Game => (&self.game_tx, &self.metrics.game_lane_drops),
        };
        match tx.try_send(ctx) {
            Ok(()) => true,
            Err(TrySendError::Full(ctx)) => {
                bump(drops);
                tracing::warn!(
                    %lane,
                    actor = %ctx.actor,
                    command = ctx.name(),
                    "command dropped, lane full"
                );
                false
            }
            // Both ends live in `self`; a disconnect cannot be observed.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Best-effort enqueue onto the system lane. Returns `false` if dropped.
    pub fn enqueue_system(&self, ctx: CommandContext) -> bool {
        self.try_push(Lane::System, ctx)
    }

    /// Best-effort enqueue onto the game lane. Returns `false` if dropped.
    pub fn enqueue_game(&self, ctx: CommandContext) -> bool {
        self.try_push(Lane::Game, ctx)
    }

    /// Resubmit a context after a `CancelRequeue`.
    ///
    /// Increments its requeue count first. A context past the requeue
    /// bound, or one that finds the game lane full, is dropped.
    pub fn requeue(&self, mut ctx: CommandContext) -> bool {
        ctx.requeue_count += 1;
        if let Some(limit) = self.requeue_limit {
            if ctx.requeue_count > limit {
                bump(&self.metrics.requeue_drops);
                tracing::warn!(
                    actor = %ctx.actor,
                    command = ctx.name(),
                    requeues = ctx.requeue_count - 1,
                    limit,
                    "requeue bound exceeded, command dropped"
                );
                return false;
            }
        }
        if self.try_push(Lane::Game, ctx) {
            bump(&self.metrics.requeues);
            true
        } else {
            bump(&self.metrics.requeue_drops);
            false
        }
    }

    /// Capture one round at `now`.
    ///
    /// Makes a single pass over the contexts queued when the drain began.
    /// Delayed contexts that are not ready go back to the tail and are
    /// not revisited in the same pass.
    pub fn drain_round_at(&self, now: Instant) -> Round {
        let id = RoundId(self.round.fetch_add(1, Ordering::AcqRel) + 1);
        bump(&self.metrics.rounds);

        let pending = self.game_rx.len();
        let mut contexts = Vec::with_capacity(pending);
        let mut deferred = 0;
        for _ in 0..pending {
            let Ok(mut ctx) = self.game_rx.try_recv() else {
                break;
            };
            if ctx.is_ready_at(now) {
                ctx.round = id;
                contexts.push(ctx);
            } else if self.try_push(Lane::Game, ctx) {
                deferred += 1;
            }
        }
        Round {
            id,
            contexts,
            deferred,
        }
    }

    /// Capture one round now.
    pub fn drain_round(&self) -> Round {
        self.drain_round_at(Instant::now())
    }

    /// Pop one system-lane context without blocking.
    pub fn try_recv_system(&self) -> Option<CommandContext> {
        self.system_rx.try_recv().ok()
    }

    /// A handle on the system lane for a consumer loop.
    pub(crate) fn system_receiver(&self) -> Receiver<CommandContext> {
        self.system_rx.clone()
    }

    /// The most recently captured round, or zero before the first drain.
    pub fn current_round(&self) -> RoundId {
        RoundId(self.round.load(Ordering::Acquire))
    }

    /// Contexts waiting on the system lane.
    pub fn system_len(&self) -> usize {
        self.system_rx.len()
    }

    /// Contexts waiting on the game lane.
    pub fn game_len(&self) -> usize {
        self.game_rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::ActorId;
    use hearth_test_utils::Probe;
    use std::time::Duration;

    fn lanes(system: usize, game: usize, limit: Option<u32>) -> Lanes {
        Lanes::new(system, game, limit, Arc::new(EngineMetrics::default()))
    }

    fn ctx(tag: u64) -> CommandContext {
        CommandContext::new(ActorId(tag), Probe::tagged("probe", tag))
    }

    fn tags(round: &Round) -> Vec<u64> {
        round
            .contexts
            .iter()
            .filter_map(|c| c.command_as::<Probe>().map(|p| p.tag))
            .collect()
    }

    #[test]
    fn round_captures_in_order_and_stamps() {
        let l = lanes(4, 8, None);
        for t in 1..=3 {
            assert!(l.enqueue_game(ctx(t)));
        }
        let round = l.drain_round_at(Instant::now());
        assert_eq!(round.id, RoundId(1));
        assert_eq!(tags(&round), [1, 2, 3]);
        assert!(round.contexts.iter().all(|c| c.round == RoundId(1)));
        assert_eq!(l.game_len(), 0);
    }

    #[test]
    fn empty_drain_still_advances_round() {
        let l = lanes(4, 8, None);
        assert_eq!(l.current_round(), RoundId(0));
        l.drain_round_at(Instant::now());
        let second = l.drain_round_at(Instant::now());
        assert_eq!(second.id, RoundId(2));
        assert!(second.contexts.is_empty());
        assert_eq!(l.current_round(), RoundId(2));
    }

    #[test]
    fn full_game_lane_drops_without_blocking() {
        let l = lanes(4, 2, None);
        assert!(l.enqueue_game(ctx(1)));
        assert!(l.enqueue_game(ctx(2)));
        assert!(!l.enqueue_game(ctx(3)));
        assert_eq!(l.game_len(), 2);
        assert_eq!(l.metrics.snapshot().game_lane_drops, 1);
    }

    #[test]
    fn full_system_lane_drops_without_blocking() {
        let l = lanes(1, 2, None);
        assert!(l.enqueue_system(ctx(1)));
        assert!(!l.enqueue_system(ctx(2)));
        assert_eq!(l.metrics.snapshot().system_lane_drops, 1);
        assert_eq!(l.try_recv_system().map(|c| c.actor), Some(ActorId(1)));
        assert!(l.try_recv_system().is_none());
    }

    #[test]
    fn delayed_context_waits_at_tail() {
        let l = lanes(4, 8, None);
        let base = Instant::now();
        l.enqueue_game(ctx(1).not_before(base + Duration::from_millis(100)));
        l.enqueue_game(ctx(2));

        let first = l.drain_round_at(base);
        assert_eq!(tags(&first), [2]);
        assert_eq!(first.deferred, 1);
        assert_eq!(l.game_len(), 1);

        let second = l.drain_round_at(base + Duration::from_millis(100));
        assert_eq!(tags(&second), [1]);
        assert_eq!(second.contexts[0].round, RoundId(2));
    }

    #[test]
    fn drain_is_one_pass_over_original_count() {
        let l = lanes(4, 8, None);
        let later = Instant::now() + Duration::from_secs(60);
        for t in 1..=3 {
            l.enqueue_game(ctx(t).not_before(later));
        }
        let round = l.drain_round_at(Instant::now());
        assert!(round.contexts.is_empty());
        assert_eq!(round.deferred, 3);
        assert_eq!(l.game_len(), 3);
    }

    #[test]
    fn requeue_counts_and_respects_bound() {
        let l = lanes(4, 8, Some(2));
        let mut c = ctx(1);
        assert!(l.requeue(c.clone()));
        c = l.drain_round_at(Instant::now()).contexts.remove(0);
        assert_eq!(c.requeue_count, 1);
        assert!(l.requeue(c));
        c = l.drain_round_at(Instant::now()).contexts.remove(0);
        assert_eq!(c.requeue_count, 2);
        assert!(!l.requeue(c));
        assert_eq!(l.game_len(), 0);

        let m = l.metrics.snapshot();
        assert_eq!(m.requeues, 2);
        assert_eq!(m.requeue_drops, 1);
    }

    #[test]
    fn unbounded_requeue_never_drops_on_count() {
        let l = lanes(4, 8, None);
        let mut c = ctx(1);
        c.requeue_count = 1_000;
        assert!(l.requeue(c));
    }
}
