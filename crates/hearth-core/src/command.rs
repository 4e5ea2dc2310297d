//! The [`Command`] trait and the built-in inbound command shapes.
//!
//! The core treats commands as opaque beyond their [`name()`](Command::name):
//! the dispatcher routes on the name and listeners recover the concrete
//! shape with [`downcast_ref()`](trait.Command.html#method.downcast_ref).

use std::any::Any;
use std::fmt;

use smallvec::SmallVec;

use crate::id::{ActorId, RoomKey};

/// Any value exposing a stable name. Immutable after creation.
///
/// Commands are produced at the edges (connection readers, internal
/// events) and shared read-only with every listener in a dispatch chain.
///
/// # Examples
///
/// ```
/// use hearth_core::{Command, Input, ActorId};
///
/// let cmd: Box<dyn Command> = Box::new(Input::new(ActorId(7), "look"));
/// assert_eq!(cmd.name(), "Input");
/// assert_eq!(cmd.downcast_ref::<Input>().map(|i| i.text.as_str()), Some("look"));
/// ```
pub trait Command: Any + Send + Sync + fmt::Debug {
    /// Stable routing name. Listeners register against this value.
    fn name(&self) -> &str;
}

impl dyn Command {
    /// Recover the concrete command shape, if it is a `T`.
    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Whether the command is a `T`.
    pub fn is<T: Command>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }
}

/// A raw line of text typed by an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    /// The actor that sent the text.
    pub actor: ActorId,
    /// The text, already trimmed of line terminators.
    pub text: String,
}

impl Input {
    /// Routing name of this shape.
    pub const NAME: &'static str = "Input";

    /// Create an input command.
    pub fn new(actor: ActorId, text: impl Into<String>) -> Self {
        Self {
            actor,
            text: text.into(),
        }
    }

    /// The first whitespace-separated word, lowercased, and the rest.
    ///
    /// Returns `("", "")` for blank input.
    pub fn verb_and_args(&self) -> (String, &str) {
        let trimmed = self.text.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb.to_lowercase(), rest.trim_start()),
            None => (trimmed.to_lowercase(), ""),
        }
    }
}

impl Command for Input {
    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Text to deliver to one actor, a room, or both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Direct recipient. For room-wide messages this is the sender, who
    /// is skipped during room delivery.
    pub target: Option<ActorId>,
    /// Occupants that must not receive a room-wide message.
    pub excluded: SmallVec<[ActorId; 4]>,
    /// Room to broadcast to, if any.
    pub room: Option<RoomKey>,
    /// The message body.
    pub text: String,
    /// Whether the message is speech (say/shout/chat) and therefore
    /// subject to deafness-style filters in listeners.
    pub is_communication: bool,
}

impl Message {
    /// Routing name of this shape.
    pub const NAME: &'static str = "Message";

    /// A message addressed to a single actor.
    pub fn to_actor(target: ActorId, text: impl Into<String>) -> Self {
        Self {
            target: Some(target),
            excluded: SmallVec::new(),
            room: None,
            text: text.into(),
            is_communication: false,
        }
    }

    /// A message broadcast to a room, excluding `sender` if given.
    pub fn to_room(room: RoomKey, sender: Option<ActorId>, text: impl Into<String>) -> Self {
        Self {
            target: sender,
            excluded: SmallVec::new(),
            room: Some(room),
            text: text.into(),
            is_communication: false,
        }
    }

    /// Add actors that must not receive the room-wide copy.
    pub fn excluding(mut self, actors: impl IntoIterator<Item = ActorId>) -> Self {
        self.excluded.extend(actors);
        self
    }

    /// Mark the message as speech.
    pub fn as_communication(mut self) -> Self {
        self.is_communication = true;
        self
    }

    /// Whether `actor` should receive the room-wide copy.
    pub fn reaches(&self, actor: ActorId) -> bool {
        self.target != Some(actor) && !self.excluded.contains(&actor)
    }
}

impl Command for Message {
    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Request to render a room description for an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayRoom {
    /// The viewer.
    pub actor: ActorId,
    /// The room to describe.
    pub room: RoomKey,
}

impl DisplayRoom {
    /// Routing name of this shape.
    pub const NAME: &'static str = "DisplayRoom";
}

impl Command for DisplayRoom {
    fn name(&self) -> &str {
        Self::NAME
    }
}

/// An actor is leaving the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerQuit {
    /// The departing actor.
    pub actor: ActorId,
}

impl PlayerQuit {
    /// Routing name of this shape.
    pub const NAME: &'static str = "PlayerQuit";
}

impl Command for PlayerQuit {
    fn name(&self) -> &str {
        Self::NAME
    }
}

/// Request to re-send the input prompt to an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendPrompt {
    /// The actor whose prompt should be refreshed.
    pub actor: ActorId,
}

impl SendPrompt {
    /// Routing name of this shape.
    pub const NAME: &'static str = "SendPrompt";
}

impl Command for SendPrompt {
    fn name(&self) -> &str {
        Self::NAME
    }
}
