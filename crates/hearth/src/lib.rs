//! Hearth: the command pipeline behind a text-based multiplayer game.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Hearth sub-crates. For most users, adding `hearth` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use hearth::prelude::*;
//!
//! let world = World::new(EngineConfig::default()).unwrap();
//! world.presence().join(ActorId(1), RoomKey::new("town", "square"));
//!
//! world
//!     .register(
//!         Arc::new(FnListener::typed::<Input>("parser", 10, |input, _ctx| {
//!             assert_eq!(input.text, "look");
//!             ListenResult::Continue
//!         })),
//!         &[Input::NAME],
//!     )
//!     .unwrap();
//!
//! world.queue_game(ActorId(1), Input::new(ActorId(1), "look"));
//! let report = world.run_round_at(Instant::now());
//! assert_eq!(report.dispatched, 1);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `hearth-core` | IDs, commands, contexts, listeners, errors |
//! | [`engine`] | `hearth-engine` | Dispatcher, lanes, scheduler, throttle, balance, runtime |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`hearth-core`).
///
/// Contains the [`types::Command`] trait and built-in command shapes,
/// [`types::CommandContext`], the [`types::Listener`] trait and the
/// error enums.
pub use hearth_core as types;

/// Pipeline engine (`hearth-engine`).
///
/// [`engine::World`] for lockstep driving, [`engine::Runtime`] for the
/// threaded loops.
pub use hearth_engine as engine;

/// Common imports for typical Hearth usage.
///
/// ```rust
/// use hearth::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use hearth_core::{
        ActionType, ActorId, BagValue, Command, CommandContext, DisplayRoom, Input, ListenResult,
        Listener, Message, PlayerQuit, RoomKey, RoundId, SendPrompt,
    };

    // Errors
    pub use hearth_core::{ActionError, DispatchError, SubmitError};

    // Engine
    pub use hearth_engine::{
        BalanceCategory, ConfigError, ConnectionWorker, Disconnect, EngineConfig, FnListener,
        Runtime, SchedulerHost, ShutdownReport, World,
    };
}
