//! Command pipeline engine for Hearth.
//!
//! Provides the [`World`] service that wires the dispatcher, the two
//! priority lanes, the action scheduler, the input throttle and the
//! balance ledgers together, and the threaded [`Runtime`] that drives
//! it. Supports both lockstep (call the consumer steps yourself) and
//! realtime modes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod actors;
pub mod balance;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod lanes;
pub mod metrics;
pub mod runtime;
pub mod scheduler;
pub mod throttle;
pub(crate) mod tick_thread;
pub mod world;

pub use actors::{ActorTable, Presence, RoomOccupancy};
pub use balance::{BalanceCategory, BalanceLedger, Recovered, UnknownCategory};
pub use config::{BalanceConfig, ConfigError, EngineConfig};
pub use connection::{ConnectionWorker, Disconnect};
pub use dispatcher::{DispatchOutcome, Dispatcher, FnListener, WILDCARD};
pub use lanes::{Lane, Lanes, Round};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use runtime::{Runtime, ShutdownReport};
pub use scheduler::{heartbeat, Action, ActionCallback, ActionScheduler, Payload, SchedulerHost};
pub use throttle::{InputSender, ThrottleState};
pub use world::{RoundReport, World, WorldStats, LEFT_ROOM_KEY, QUIT_LISTENER, QUIT_PRIORITY};
