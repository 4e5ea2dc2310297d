//! Strongly-typed identifiers and the [`RoomKey`] location key.

use std::fmt;

/// Identifies an actor: any entity capable of originating a command.
///
/// `ActorId(0)` is reserved for the system itself (commands with no
/// originating player or NPC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl ActorId {
    /// The reserved system actor.
    pub const SYSTEM: ActorId = ActorId(0);

    /// Whether this is the reserved system actor.
    pub fn is_system(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ActorId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Monotonically increasing round counter.
///
/// Every game-lane command captured during one tick's drain is stamped
/// with the same `RoundId`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub u64);

impl RoundId {
    /// The round that follows this one.
    pub fn next(self) -> RoundId {
        RoundId(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RoundId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a scheduled action. Assigned by the scheduler at push time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action_{}", self.0)
    }
}

impl From<u64> for ActionId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Location key of the form `area:room`.
///
/// The core never interprets rooms; the key is an opaque routing value
/// for occupancy tables and room-wide messages. A key without a `:`
/// separator is treated as a room in the empty area.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(String);

impl RoomKey {
    /// Build a key from its area and room parts.
    pub fn new(area: &str, room: &str) -> Self {
        Self(format!("{area}:{room}"))
    }

    /// The area part of the key.
    pub fn area(&self) -> &str {
        self.split().0
    }

    /// The room part of the key.
    pub fn room(&self) -> &str {
        self.split().1
    }

    /// Both parts as `(area, room)`.
    pub fn split(&self) -> (&str, &str) {
        self.0.split_once(':').unwrap_or(("", self.0.as_str()))
    }

    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(v: &str) -> Self {
        Self(v.to_owned())
    }
}

impl From<String> for RoomKey {
    fn from(v: String) -> Self {
        Self(v)
    }
}
