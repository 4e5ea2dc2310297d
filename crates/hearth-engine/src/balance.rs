//! Per-actor cooldown ledger.
//!
//! Each actor owns one [`BalanceLedger`]: a fixed table of "free at"
//! instants indexed by [`BalanceCategory`]. An empty slot means the
//! actor has balance in that category. Re-using a category overwrites
//! its slot, so there is at most one active cooldown per category.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::config::BalanceConfig;

/// Cooldown category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BalanceCategory {
    /// Offensive actions.
    Attack,
    /// Healing and recovery actions.
    Healing,
    /// Movement between rooms.
    Movement,
}

impl BalanceCategory {
    /// Every category, in table order.
    pub const ALL: [BalanceCategory; 3] = [Self::Attack, Self::Healing, Self::Movement];

    const fn index(self) -> usize {
        match self {
            Self::Attack => 0,
            Self::Healing => 1,
            Self::Movement => 2,
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Healing => "healing",
            Self::Movement => "movement",
        }
    }
}

impl fmt::Display for BalanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`BalanceCategory`] name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown balance category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for BalanceCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

/// Categories recovered by one sweep.
pub type Recovered = SmallVec<[BalanceCategory; 3]>;

#[derive(Debug)]
struct Slots {
    free_at: [Option<Instant>; 3],
    cooldowns: [Duration; 3],
}

/// One actor's cooldown table, behind its own lock.
#[derive(Debug)]
pub struct BalanceLedger {
    slots: Mutex<Slots>,
}

impl Default for BalanceLedger {
    fn default() -> Self {
        Self::new(&BalanceConfig::default())
    }
}

impl BalanceLedger {
    /// An empty ledger with default durations from `config`.
    pub fn new(config: &BalanceConfig) -> Self {
        Self {
            slots: Mutex::new(Slots {
                free_at: [None; 3],
                cooldowns: BalanceCategory::ALL.map(|c| config.default_duration(c)),
            }),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Default cooldown for `category`.
    pub fn default_duration(&self, category: BalanceCategory) -> Duration {
        self.slots().cooldowns[category.index()]
    }

    /// Override the default cooldown for `category` on this ledger only.
    pub fn set_cooldown(&self, category: BalanceCategory, duration: Duration) {
        self.slots().cooldowns[category.index()] = duration;
    }

    /// Start a cooldown at `now`. `None` uses the category default.
    ///
    /// Returns the instant the category becomes free again.
    pub fn use_balance_at(
        &self,
        now: Instant,
        category: BalanceCategory,
        duration: Option<Duration>,
    ) -> Instant {
        let mut slots = self.slots();
        let i = category.index();
        let free_at = now + duration.unwrap_or(slots.cooldowns[i]);
        slots.free_at[i] = Some(free_at);
        free_at
    }

    /// Start a cooldown now.
    pub fn use_balance(&self, category: BalanceCategory, duration: Option<Duration>) -> Instant {
        self.use_balance_at(Instant::now(), category, duration)
    }

    /// Whether `category` is free at `now`.
    pub fn has_balance_at(&self, now: Instant, category: BalanceCategory) -> bool {
        self.slots().free_at[category.index()].is_none_or(|at| at <= now)
    }

    /// Whether `category` is free now.
    pub fn has_balance(&self, category: BalanceCategory) -> bool {
        self.has_balance_at(Instant::now(), category)
    }

    /// Remaining cooldown at `now`. Zero when free.
    pub fn time_until_balance_at(&self, now: Instant, category: BalanceCategory) -> Duration {
        self.slots().free_at[category.index()]
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Remaining cooldown now.
    pub fn time_until_balance(&self, category: BalanceCategory) -> Duration {
        self.time_until_balance_at(Instant::now(), category)
    }

    /// Clear every expired slot and return the categories cleared.
    ///
    /// Clearing is only bookkeeping: an expired slot already reads as
    /// free, so a concurrent `use_balance` is never lost.
    pub fn sweep_recovered_at(&self, now: Instant) -> Recovered {
        let mut slots = self.slots();
        let mut recovered = Recovered::new();
        for category in BalanceCategory::ALL {
            let slot = &mut slots.free_at[category.index()];
            if slot.is_some_and(|at| at <= now) {
                *slot = None;
                recovered.push(category);
            }
        }
        recovered
    }

    /// Clear every expired slot now.
    pub fn sweep_recovered(&self) -> Recovered {
        self.sweep_recovered_at(Instant::now())
    }

    /// Whether any cooldown slot is occupied (expired or not).
    pub fn has_entries(&self) -> bool {
        self.slots().free_at.iter().any(Option::is_some)
    }
}
