//! End-to-end pipeline properties, driven in lockstep through `World`.
//!
//! Every test uses the explicit-`now` entry points so timing is
//! deterministic; no threads are spawned here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hearth_core::{ActionType, ActorId, Input, ListenResult, Message, PlayerQuit, RoomKey, SubmitError};
use hearth_engine::{
    BalanceCategory, DispatchOutcome, EngineConfig, FnListener, SchedulerHost, World,
    LEFT_ROOM_KEY,
};
use hearth_test_utils::{CallLog, Probe, RecordingListener, RequeueingListener};
use proptest::prelude::*;

const ALICE: ActorId = ActorId(1);
const BOB: ActorId = ActorId(2);

fn square() -> RoomKey {
    RoomKey::new("town", "square")
}

fn world_with(config: EngineConfig) -> World {
    let world = World::new(config).unwrap();
    world.presence().join(ALICE, square());
    world.presence().join(BOB, square());
    world
}

fn world() -> World {
    world_with(EngineConfig::default())
}

// ── Registry ordering ────────────────────────────────────────────

#[derive(Clone, Debug)]
enum RegistryOp {
    Register { priority: i32, global: bool },
    Unregister { pick: usize },
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        3 => (-5i32..5, any::<bool>())
            .prop_map(|(priority, global)| RegistryOp::Register { priority, global }),
        1 => any::<usize>().prop_map(|pick| RegistryOp::Unregister { pick }),
    ]
}

fn priority_of(name: &str) -> i32 {
    name.split(':').nth(1).and_then(|p| p.parse().ok()).unwrap()
}

proptest! {
    #[test]
    fn merged_chain_stays_priority_sorted(ops in prop::collection::vec(registry_op(), 1..40)) {
        let world = World::new(EngineConfig::default()).unwrap();
        let log = CallLog::new();
        let mut live: Vec<String> = Vec::new();

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                RegistryOp::Register { priority, global } => {
                    let name = format!("l{i}:{priority}");
                    let listener = Arc::new(RecordingListener::new(name.clone(), priority, &log));
                    if global {
                        world.register_global(listener).unwrap();
                    } else {
                        world.register(listener, &["Probe"]).unwrap();
                    }
                    live.push(name);
                }
                RegistryOp::Unregister { pick } => {
                    if !live.is_empty() {
                        let name = live.remove(pick % live.len());
                        world.unregister(&name).unwrap();
                    }
                }
            }

            let chain = world.dispatcher().listeners_for("Probe");
            let priorities: Vec<i32> = chain.iter().map(|n| priority_of(n)).collect();
            prop_assert!(priorities.windows(2).all(|w| w[0] <= w[1]), "{chain:?}");
            prop_assert_eq!(chain.len(), live.len());
        }
    }
}

#[test]
fn unregister_unknown_name_fails() {
    let w = world();
    assert!(w.unregister("nobody").is_err());
}

// ── Dispatch chain ───────────────────────────────────────────────

#[test]
fn cancel_stops_the_chain() {
    let w = world();
    let log = CallLog::new();
    w.register(Arc::new(RecordingListener::new("first", 1, &log)), &["Probe"])
        .unwrap();
    w.register(
        Arc::new(RecordingListener::new("second", 2, &log).returning(ListenResult::Cancel)),
        &["Probe"],
    )
    .unwrap();
    w.register(Arc::new(RecordingListener::new("third", 3, &log)), &["Probe"])
        .unwrap();

    w.queue_game(ALICE, Probe::named("Probe"));
    let report = w.run_round();

    assert_eq!(log.entries(), ["first", "second"]);
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.cancelled, 1);
}

#[test]
fn wildcard_listener_sees_every_command() {
    let w = world();
    let log = CallLog::new();
    w.register_global(Arc::new(RecordingListener::new("audit", 0, &log)))
        .unwrap();
    w.queue_game(ALICE, Probe::named("Probe"));
    w.queue_game(ALICE, Input::new(ALICE, "look"));
    w.queue_system(ALICE, Message::to_actor(ALICE, "hi"));

    w.drain_system();
    w.run_round();
    assert_eq!(log.len(), 3);
}

#[test]
fn mistyped_listener_is_skipped() {
    let w = world();
    let log = CallLog::new();
    let typed_log = log.clone();
    w.register(
        Arc::new(FnListener::typed::<Input>("wants-input", 1, move |_, _| {
            typed_log.push("typed");
            ListenResult::Cancel
        })),
        &["Probe"],
    )
    .unwrap();
    w.register(Arc::new(RecordingListener::new("after", 2, &log)), &["Probe"])
        .unwrap();

    w.queue_game(ALICE, Probe::named("Probe"));
    w.run_round();
    assert_eq!(log.entries(), ["after"]);
}

#[test]
fn requeue_restarts_chain_in_next_round() {
    let w = world();
    let log = CallLog::new();
    w.register(Arc::new(RecordingListener::new("head", 1, &log)), &["Probe"])
        .unwrap();
    w.register(
        Arc::new(RequeueingListener::new("retry", 2, 1, &log)),
        &["Probe"],
    )
    .unwrap();

    w.queue_game(ALICE, Probe::named("Probe"));
    let first = w.run_round();
    let second = w.run_round();

    assert_eq!(first.requeued, 1);
    assert_eq!(second.requeued, 0);
    assert_eq!(second.dispatched, 1);
    assert_eq!(
        log.entries(),
        [
            "head".to_string(),
            format!("retry:{}", first.id),
            "head".to_string(),
            format!("retry:{}", second.id),
        ]
    );
}

#[test]
fn endless_requeue_is_bounded() {
    let w = world_with(EngineConfig {
        max_requeues: 3,
        ..EngineConfig::default()
    });
    let log = CallLog::new();
    w.register(
        Arc::new(RequeueingListener::new("forever", 1, u32::MAX, &log)),
        &["Probe"],
    )
    .unwrap();

    w.queue_game(ALICE, Probe::named("Probe"));
    for _ in 0..10 {
        w.run_round();
    }
    // One initial dispatch plus three requeued passes.
    assert_eq!(log.len(), 4);
    let stats = w.stats();
    assert_eq!(stats.metrics.requeue_drops, 1);
    assert_eq!(stats.game_queue_len, 0);
}

#[test]
fn round_ids_increase_even_when_idle() {
    let w = world();
    let a = w.run_round().id;
    let b = w.run_round().id;
    assert!(b > a);
}

#[test]
fn delayed_command_waits_for_its_round() {
    let w = world();
    let log = CallLog::new();
    w.register(Arc::new(RecordingListener::new("seen", 1, &log)), &["Probe"])
        .unwrap();
    let now = Instant::now();
    w.queue_game_delayed_at(now, ALICE, Probe::named("Probe"), Duration::from_millis(500));
    w.queue_game(ALICE, Probe::named("Probe"));

    let early = w.run_round_at(now);
    assert_eq!(early.dispatched, 1);
    assert_eq!(early.deferred, 1);

    let late = w.run_round_at(now + Duration::from_millis(500));
    assert_eq!(late.dispatched, 1);
    assert_eq!(log.len(), 2);
}

#[test]
fn quit_removes_actor_before_later_listeners() {
    let w = world();
    let seen = CallLog::new();
    let probe = seen.clone();
    w.register(
        Arc::new(FnListener::new("after-quit", 10, move |ctx| {
            if let Some(room) = ctx.get(LEFT_ROOM_KEY) {
                probe.push(format!("{room:?}"));
            }
            ListenResult::Continue
        })),
        &[PlayerQuit::NAME],
    )
    .unwrap();

    w.queue_system(ALICE, PlayerQuit { actor: ALICE });
    assert_eq!(w.drain_system(), 1);
    assert!(!w.presence().contains(ALICE));
    assert_eq!(w.presence().occupants(&square()), [BOB]);
    assert_eq!(seen.len(), 1);
}

#[test]
fn direct_dispatch_reports_outcome() {
    let w = world();
    let log = CallLog::new();
    w.register(
        Arc::new(RecordingListener::new("stop", 1, &log).returning(ListenResult::Cancel)),
        &["Probe"],
    )
    .unwrap();
    let ctx = hearth_core::CommandContext::new(ALICE, Probe::named("Probe"));
    assert!(matches!(w.dispatch(ctx), DispatchOutcome::Cancelled { .. }));
}

// ── Scheduler ────────────────────────────────────────────────────

#[test]
fn process_tick_runs_due_and_skips_future() {
    let w = world();
    let log = CallLog::new();
    let now = Instant::now();
    for (label, delay_ms) in [("due-a", 0), ("due-b", 10), ("future", 11)] {
        let log = log.clone();
        w.scheduler().schedule_at(
            now,
            ActionType::NpcAction,
            Duration::from_millis(delay_ms),
            None,
            None,
            move |_, _| {
                log.push(label);
                Ok(())
            },
        );
    }

    let ran = w.process_tick_at(now + Duration::from_millis(10));
    assert_eq!(ran, 2);
    assert_eq!(log.entries(), ["due-a", "due-b"]);
    assert_eq!(w.scheduler().len(), 1);
}

#[test]
fn equal_time_resolves_by_priority() {
    let w = world();
    let log = CallLog::new();
    let now = Instant::now();
    for kind in [ActionType::SpellEffect, ActionType::PlayerCommand] {
        let log = log.clone();
        w.scheduler()
            .schedule_at(now, kind, Duration::ZERO, None, None, move |a, _| {
                log.push(a.kind.to_string());
                Ok(())
            });
    }
    w.process_tick_at(now);
    assert_eq!(log.entries(), ["player_command", "spell_effect"]);
}

#[test]
fn failing_callback_does_not_stop_the_pass() {
    let w = world();
    let log = CallLog::new();
    let now = Instant::now();
    w.scheduler()
        .schedule_at(now, ActionType::PlayerCommand, Duration::ZERO, None, None, |_, _| {
            Err(hearth_core::ActionError::failed("boom"))
        });
    let tail = log.clone();
    w.scheduler()
        .schedule_at(now, ActionType::Heartbeat, Duration::ZERO, None, None, move |_, _| {
            tail.push("ran");
            Ok(())
        });
    assert_eq!(w.process_tick_at(now), 2);
    assert_eq!(log.entries(), ["ran"]);
    assert_eq!(w.stats().metrics.action_failures, 1);
}

#[test]
fn zero_delay_heartbeat_reschedules_once() {
    let w = world();
    let now = Instant::now();
    w.schedule_heartbeat_at(now, Duration::ZERO);
    w.process_tick_at(now);

    let beats = w.scheduler().pending_of(ActionType::Heartbeat);
    assert_eq!(beats.len(), 1);
    let due_in = beats[0].1.saturating_duration_since(now);
    assert!(due_in >= Duration::from_secs(30));
    assert!(due_in < Duration::from_secs(31));
}

// ── Balance ──────────────────────────────────────────────────────

#[test]
fn balance_spent_then_recovered() {
    let w = world();
    let ledger = w.presence().actors().ledger(ALICE).unwrap();
    let now = Instant::now();
    let d = Duration::from_millis(200);
    ledger.use_balance_at(now, BalanceCategory::Attack, Some(d));
    assert!(!ledger.has_balance_at(now, BalanceCategory::Attack));
    assert!(ledger.has_balance_at(now, BalanceCategory::Healing));
    assert_eq!(ledger.time_until_balance_at(now, BalanceCategory::Attack), d);
    assert!(ledger.has_balance_at(now + d, BalanceCategory::Attack));
}

#[test]
fn restore_action_sends_recovery_message() {
    let w = world();
    let log = CallLog::new();
    let inbox = log.clone();
    w.register(
        Arc::new(FnListener::typed::<Message>("inbox", 1, move |m, _| {
            inbox.push(m.text.clone());
            ListenResult::Continue
        })),
        &[Message::NAME],
    )
    .unwrap();

    let now = Instant::now();
    let free_at = w
        .use_balance_with_restore_at(now, ALICE, BalanceCategory::Attack, None)
        .unwrap();
    assert_eq!(free_at, now + Duration::from_secs(3));

    w.scheduler().process_tick_at(free_at, &w);
    w.drain_system();
    assert_eq!(log.entries(), ["You have recovered your balance."]);
    assert!(!w.presence().actors().ledger(ALICE).unwrap().has_entries());
}

#[test]
fn restore_for_absent_actor_is_none() {
    let w = world();
    assert!(w
        .use_balance_with_restore(ActorId(99), BalanceCategory::Movement, None)
        .is_none());
}

// ── Input path ───────────────────────────────────────────────────

#[test]
fn three_inputs_in_one_window_admit_one() {
    let w = world();
    let input = w.input_sender();
    for text in ["n", "s", "e"] {
        assert!(input.try_send(Input::new(ALICE, text)));
    }
    assert_eq!(w.process_inputs(), 3);
    assert_eq!(w.scheduler().pending_of(ActionType::PlayerCommand).len(), 1);
    assert_eq!(w.stats().metrics.throttled_inputs, 2);

    w.reset_throttle();
    assert!(w.ingest_input(Input::new(ALICE, "w")));
}

#[test]
fn throttled_actor_gets_feedback_when_configured() {
    let w = world_with(EngineConfig {
        throttle_feedback: Some("Slow down.".into()),
        ..EngineConfig::default()
    });
    assert!(w.ingest_input(Input::new(ALICE, "a")));
    assert!(!w.ingest_input(Input::new(ALICE, "b")));
    let ctx = w.lanes().try_recv_system().unwrap();
    assert_eq!(
        ctx.command_as::<Message>().map(|m| m.text.as_str()),
        Some("Slow down.")
    );
}

#[test]
fn input_for_absent_actor_is_dropped() {
    let w = world();
    assert!(!w.ingest_input(Input::new(ActorId(42), "look")));
    assert!(w.scheduler().is_empty());
    assert_eq!(w.stats().metrics.unknown_actor_drops, 1);
}

#[test]
fn full_input_channel_drops_or_times_out() {
    let w = world_with(EngineConfig {
        input_queue_capacity: 2,
        enqueue_timeout_ms: 20,
        ..EngineConfig::default()
    });
    let input = w.input_sender();
    assert!(input.try_send(Input::new(ALICE, "a")));
    assert!(input.try_send(Input::new(ALICE, "b")));
    assert!(!input.try_send(Input::new(ALICE, "c")));

    let start = Instant::now();
    assert_eq!(w.handle_input(ALICE, "d"), Err(SubmitError::QueueFull));
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert_eq!(w.stats().input_queue_len, 2);
}

#[test]
fn admitted_input_reaches_listeners_next_round() {
    let w = world();
    let log = CallLog::new();
    let heard = log.clone();
    w.register(
        Arc::new(FnListener::typed::<Input>("parser", 1, move |input, _| {
            heard.push(input.text.clone());
            ListenResult::Continue
        })),
        &[Input::NAME],
    )
    .unwrap();

    w.handle_input(ALICE, "look").unwrap();
    w.process_inputs();
    let now = Instant::now();
    assert_eq!(w.process_tick_at(now), 1);
    let report = w.run_round_at(now);

    assert_eq!(report.dispatched, 1);
    assert_eq!(log.entries(), ["look"]);
}
