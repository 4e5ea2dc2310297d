//! Core types and traits for the Hearth command pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every layer of the workspace: identifiers,
//! the [`Command`] trait and its built-in shapes, the per-dispatch
//! [`CommandContext`], the [`Listener`] trait, scheduled action types,
//! and the error enums.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod command;
pub mod context;
pub mod error;
pub mod id;
pub mod listener;

pub use action::ActionType;
pub use command::{Command, DisplayRoom, Input, Message, PlayerQuit, SendPrompt};
pub use context::{BagValue, CommandContext};
pub use error::{ActionError, DispatchError, SubmitError};
pub use id::{ActionId, ActorId, RoomKey, RoundId};
pub use listener::{ListenResult, Listener};
