//! Consumer loops run by the [`Runtime`](crate::Runtime) threads.
//!
//! Each loop owns an `Arc<World>` and a shutdown receiver. The runtime
//! holds the matching sender and drops it to stop every loop at once:
//! a disconnected shutdown channel wakes each `select!` immediately,
//! including the round-pacing wait.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, RecvTimeoutError};

use hearth_core::Input;

use crate::world::World;

/// Dispatches system-lane contexts as soon as they arrive.
pub(crate) struct SystemLoop {
    world: Arc<World>,
    shutdown: Receiver<()>,
}

impl SystemLoop {
    pub fn new(world: Arc<World>, shutdown: Receiver<()>) -> Self {
        Self { world, shutdown }
    }

    pub fn run(self) {
        let lane = self.world.lanes().system_receiver();
        loop {
            select! {
                recv(lane) -> msg => match msg {
                    Ok(ctx) => {
                        self.world.dispatch(ctx);
                    }
                    Err(_) => break,
                },
                recv(self.shutdown) -> _ => break,
            }
        }
        tracing::debug!("system loop exited");
    }
}

/// Captures and dispatches one game round per tick, then paces.
pub(crate) struct RoundLoop {
    world: Arc<World>,
    shutdown: Receiver<()>,
    interval: Duration,
    min_round: Duration,
}

impl RoundLoop {
    pub fn new(world: Arc<World>, shutdown: Receiver<()>) -> Self {
        let interval = world.config().tick_interval();
        let min_round = world.config().min_round_interval();
        Self {
            world,
            shutdown,
            interval,
            min_round,
        }
    }

    pub fn run(self) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(ticker) -> _ => {
                    let start = Instant::now();
                    self.world.run_round_at(start);
                    if !self.pace(start) {
                        break;
                    }
                }
                recv(self.shutdown) -> _ => break,
            }
        }
        tracing::debug!("round loop exited");
    }

    /// Sleep out the rest of the minimum round spacing. Returns `false`
    /// if shutdown arrived during the wait.
    fn pace(&self, start: Instant) -> bool {
        let elapsed = start.elapsed();
        if elapsed >= self.min_round {
            return true;
        }
        !matches!(
            self.shutdown.recv_timeout(self.min_round - elapsed),
            Err(RecvTimeoutError::Disconnected) | Ok(())
        )
    }
}

/// Runs balance sweeps and due scheduler actions once per tick.
pub(crate) struct TickLoop {
    world: Arc<World>,
    shutdown: Receiver<()>,
    interval: Duration,
}

impl TickLoop {
    pub fn new(world: Arc<World>, shutdown: Receiver<()>) -> Self {
        let interval = world.config().tick_interval();
        Self {
            world,
            shutdown,
            interval,
        }
    }

    pub fn run(self) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(ticker) -> msg => match msg {
                    Ok(now) => {
                        self.world.process_tick_at(now.max(Instant::now()));
                    }
                    Err(_) => break,
                },
                recv(self.shutdown) -> _ => break,
            }
        }
        tracing::debug!("tick loop exited");
    }
}

/// Drains the input channel through the throttle and resets the
/// per-actor counters every window.
pub(crate) struct ThrottleLoop {
    world: Arc<World>,
    shutdown: Receiver<()>,
    inputs: Receiver<Input>,
    window: Duration,
}

impl ThrottleLoop {
    pub fn new(world: Arc<World>, shutdown: Receiver<()>) -> Self {
        let inputs = world.input_receiver();
        let window = world.config().throttle_window();
        Self {
            world,
            shutdown,
            inputs,
            window,
        }
    }

    pub fn run(self) {
        let reset = tick(self.window);
        loop {
            select! {
                recv(self.inputs) -> msg => match msg {
                    Ok(input) => {
                        self.world.ingest_input(input);
                    }
                    Err(_) => break,
                },
                recv(reset) -> _ => self.world.reset_throttle(),
                recv(self.shutdown) -> _ => break,
            }
        }
        tracing::debug!("throttle loop exited");
    }
}
