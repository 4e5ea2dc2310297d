//! Scheduled action type tags and their static priority table.

use std::fmt;

/// Kind of a scheduled action. Determines its tie-break priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Admitted player input on its way to the game lane.
    PlayerCommand,
    /// A delayed spell or ability effect.
    SpellEffect,
    /// An NPC behaviour step.
    NpcAction,
    /// Recovery of an actor's balance.
    BalanceRestore,
    /// Periodic health/mana style regeneration.
    Regeneration,
    /// The recurring world heartbeat.
    Heartbeat,
    /// Application-defined action kind. Gets [`ActionType::DEFAULT_PRIORITY`].
    Custom(u16),
}

impl ActionType {
    /// Priority assigned to types outside the static table.
    pub const DEFAULT_PRIORITY: i32 = 50;

    /// Static type to priority mapping. Lower runs first on equal time.
    pub const fn priority(self) -> i32 {
        match self {
            Self::PlayerCommand => 10,
            Self::SpellEffect => 20,
            Self::NpcAction => 30,
            Self::BalanceRestore => 40,
            Self::Regeneration => 50,
            Self::Heartbeat => 100,
            Self::Custom(_) => Self::DEFAULT_PRIORITY,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerCommand => f.write_str("player_command"),
            Self::SpellEffect => f.write_str("spell_effect"),
            Self::NpcAction => f.write_str("npc_action"),
            Self::BalanceRestore => f.write_str("balance_restore"),
            Self::Regeneration => f.write_str("regeneration"),
            Self::Heartbeat => f.write_str("heartbeat"),
            Self::Custom(n) => write!(f, "custom_{n}"),
        }
    }
}
