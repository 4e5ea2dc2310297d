//! Threaded [`Runtime`] wrapper and its shutdown state machine.
//!
//! # Architecture
//!
//! ```text
//! Connection workers        hearth-throttle        hearth-tick          hearth-rounds      hearth-system
//!     |                          |                      |                     |                  |
//!     |--InputSender::try_send-->| ingest_input()       |                     |                  |
//!     |   [input: bounded]       | throttle/admit       |                     |                  |
//!     |                          |--schedule(PlayerCommand, 0)-->             |                  |
//!     |                          |                      | sweep_balances()    |                  |
//!     |                          |                      | process_tick()      |                  |
//!     |                          |                      |--queue_game()------>| run_round()      |
//!     |                          |                      |                     | pace(min_round)  |
//!     |--queue_system()-------------------------------------------------------------------->     |
//!     |                          |                      |                     |   dispatch()     |
//! ```
//!
//! Every loop selects on one shared shutdown channel. [`Runtime::shutdown`]
//! drops the only sender, which wakes all four threads at once.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Sender};

use crate::config::{ConfigError, EngineConfig};
use crate::tick_thread::{RoundLoop, SystemLoop, ThrottleLoop, TickLoop};
use crate::world::World;

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from [`Runtime::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Number of loop threads joined cleanly.
    pub threads_joined: usize,
    /// Number of loop threads that had panicked.
    pub threads_panicked: usize,
    /// Rounds captured over the runtime's life.
    pub rounds: u64,
    /// Scheduler passes over the runtime's life.
    pub ticks: u64,
}

// ── ShutdownState ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    Joining,
    Stopped,
}

// ── Runtime ──────────────────────────────────────────────────────

/// A [`World`] driven by its own consumer threads.
///
/// Producers (connection workers, game code) talk to the shared world
/// through [`world()`](Self::world); the runtime owns the loops that
/// consume it.
pub struct Runtime {
    world: Arc<World>,
    shutdown_tx: Option<Sender<()>>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
    state: ShutdownState,
}

impl Runtime {
    /// Validate `config`, build the world, schedule the first heartbeat,
    /// and spawn the loop threads.
    pub fn start(config: EngineConfig) -> Result<Self, ConfigError> {
        let world = Arc::new(World::new(config)?);
        Self::start_with(world)
    }

    /// Spawn the loop threads over an already-built world. Listeners
    /// registered on `world` before this call see every command.
    pub fn start_with(world: Arc<World>) -> Result<Self, ConfigError> {
        let heartbeat = world.config().heartbeat_interval();
        world.schedule_heartbeat_at(Instant::now(), heartbeat);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let mut runtime = Self {
            world: Arc::clone(&world),
            shutdown_tx: Some(shutdown_tx),
            threads: Vec::with_capacity(4),
            state: ShutdownState::Running,
        };

        let system = SystemLoop::new(Arc::clone(&world), shutdown_rx.clone());
        runtime.spawn("hearth-system", move || system.run())?;
        let rounds = RoundLoop::new(Arc::clone(&world), shutdown_rx.clone());
        runtime.spawn("hearth-rounds", move || rounds.run())?;
        let ticks = TickLoop::new(Arc::clone(&world), shutdown_rx.clone());
        runtime.spawn("hearth-tick", move || ticks.run())?;
        let throttle = ThrottleLoop::new(world, shutdown_rx);
        runtime.spawn("hearth-throttle", move || throttle.run())?;

        tracing::info!(
            tick_ms = runtime.world.config().tick_interval_ms,
            "runtime started"
        );
        Ok(runtime)
    }

    fn spawn(
        &mut self,
        name: &'static str,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<(), ConfigError> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                tracing::debug!(thread = name, "loop thread started");
                body();
            })
            .map_err(|source| ConfigError::Spawn { name, source })?;
        self.threads.push((name, handle));
        Ok(())
    }

    /// The shared world.
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Whether the loops are still running.
    pub fn is_running(&self) -> bool {
        self.state == ShutdownState::Running
    }

    /// Stop every loop and join its thread.
    ///
    /// Work still queued when the loops stop is left in place; the world
    /// stays usable in lockstep mode afterwards. A second call returns
    /// an empty report.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.state == ShutdownState::Stopped {
            return ShutdownReport {
                total_ms: 0,
                threads_joined: 0,
                threads_panicked: 0,
                rounds: 0,
                ticks: 0,
            };
        }

        let start = Instant::now();
        self.state = ShutdownState::Joining;
        self.shutdown_tx.take();

        let mut threads_joined = 0;
        let mut threads_panicked = 0;
        for (name, handle) in self.threads.drain(..) {
            match handle.join() {
                Ok(()) => threads_joined += 1,
                Err(_) => {
                    tracing::error!(thread = name, "loop thread panicked");
                    threads_panicked += 1;
                }
            }
        }

        self.state = ShutdownState::Stopped;
        let metrics = self.world.metrics().snapshot();
        let report = ShutdownReport {
            total_ms: start.elapsed().as_millis() as u64,
            threads_joined,
            threads_panicked,
            rounds: metrics.rounds,
            ticks: metrics.ticks,
        };
        tracing::info!(
            total_ms = report.total_ms,
            threads_joined,
            rounds = report.rounds,
            "runtime stopped"
        );
        report
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.state != ShutdownState::Stopped {
            self.shutdown();
        }
    }
}
