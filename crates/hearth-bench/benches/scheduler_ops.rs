//! Criterion micro-benchmarks for the action scheduler, throttle and
//! balance sweep.

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use hearth_bench::reference_world;
use hearth_core::{ActionType, ActorId, Input};
use hearth_engine::{BalanceCategory, SchedulerHost};

const KINDS: [ActionType; 5] = [
    ActionType::PlayerCommand,
    ActionType::SpellEffect,
    ActionType::NpcAction,
    ActionType::BalanceRestore,
    ActionType::Regeneration,
];

/// Benchmark: schedule 1000 mixed actions, then run them in one pass.
fn bench_schedule_and_process_1000(c: &mut Criterion) {
    let world = reference_world(0, 0);

    c.bench_function("schedule_process_1000", |b| {
        b.iter(|| {
            let now = Instant::now();
            for i in 0..1000u64 {
                // Deterministic spread of due times over 0..50ms.
                let delay = Duration::from_micros(i.wrapping_mul(2654435761) % 50_000);
                world.scheduler().schedule_at(
                    now,
                    KINDS[(i % 5) as usize],
                    delay,
                    None,
                    None,
                    |_, _| Ok(()),
                );
            }
            black_box(world.scheduler().process_tick_at(now + Duration::from_millis(50), &world));
        });
    });
}

/// Benchmark: push 512 inputs through the throttle into the scheduler.
fn bench_ingest_512(c: &mut Criterion) {
    let world = reference_world(0, 512);

    c.bench_function("ingest_512_inputs", |b| {
        b.iter(|| {
            for id in 1..=512u64 {
                black_box(world.ingest_input(Input::new(ActorId(id), "look")));
            }
            world.reset_throttle();
            world.process_tick_at(Instant::now());
            world.run_round_at(Instant::now());
        });
    });
}

/// Benchmark: sweep 1000 ledgers where every third actor has recovered.
fn bench_balance_sweep_1000(c: &mut Criterion) {
    let world = reference_world(0, 1000);

    c.bench_function("balance_sweep_1000", |b| {
        b.iter(|| {
            let now = Instant::now();
            for id in (1..=1000u64).step_by(3) {
                if let Some(ledger) = world.presence().actors().ledger(ActorId(id)) {
                    ledger.use_balance_at(now, BalanceCategory::Movement, Some(Duration::ZERO));
                }
            }
            black_box(world.sweep_balances_at(now));
        });
    });
}

criterion_group!(
    benches,
    bench_schedule_and_process_1000,
    bench_ingest_512,
    bench_balance_sweep_1000
);
criterion_main!(benches);
