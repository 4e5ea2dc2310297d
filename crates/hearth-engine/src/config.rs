//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is deserialised from TOML with every field optional.
//! [`validate()`](EngineConfig::validate) checks structural invariants
//! before any thread or queue is built.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use hearth_core::DispatchError;

use crate::balance::BalanceCategory;

// ── BalanceConfig ──────────────────────────────────────────────────

/// Per-category default cooldowns and recovery notifications.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalanceConfig {
    /// Default attack cooldown in milliseconds. Default: 3000.
    pub attack_ms: u64,
    /// Default healing cooldown in milliseconds. Default: 5000.
    pub healing_ms: u64,
    /// Default movement cooldown in milliseconds. Default: 1000.
    pub movement_ms: u64,
    /// Sent when attack balance recovers. `None` = no notification.
    pub attack_message: Option<String>,
    /// Sent when healing balance recovers.
    pub healing_message: Option<String>,
    /// Sent when movement balance recovers.
    pub movement_message: Option<String>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            attack_ms: 3000,
            healing_ms: 5000,
            movement_ms: 1000,
            attack_message: Some("You have recovered your balance.".into()),
            healing_message: None,
            movement_message: None,
        }
    }
}

impl BalanceConfig {
    /// Default cooldown for `category`.
    pub fn default_duration(&self, category: BalanceCategory) -> Duration {
        Duration::from_millis(match category {
            BalanceCategory::Attack => self.attack_ms,
            BalanceCategory::Healing => self.healing_ms,
            BalanceCategory::Movement => self.movement_ms,
        })
    }

    /// Recovery notification for `category`, if one is wired.
    pub fn recovery_message(&self, category: BalanceCategory) -> Option<&str> {
        match category {
            BalanceCategory::Attack => self.attack_message.as_deref(),
            BalanceCategory::Healing => self.healing_message.as_deref(),
            BalanceCategory::Movement => self.movement_message.as_deref(),
        }
    }
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Complete engine configuration.
///
/// All durations are stored as integer milliseconds (seconds for the
/// idle timeout) so the TOML form stays readable; use the accessor
/// methods for [`Duration`] values.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Ticker period driving round capture and scheduler passes. Default: 100.
    pub tick_interval_ms: u64,
    /// Minimum wall time between two rounds. Default: 50.
    pub min_round_interval_ms: u64,
    /// System lane capacity. Default: 100.
    pub system_queue_capacity: usize,
    /// Game lane capacity. Default: 300.
    pub game_queue_capacity: usize,
    /// Inbound input channel capacity. Default: 1000.
    pub input_queue_capacity: usize,
    /// Inputs admitted per actor per throttle window. Default: 1.
    pub max_inputs_per_second: u32,
    /// Throttle counter reset period. Default: 1000.
    pub throttle_window_ms: u64,
    /// Bounded-wait enqueue timeout. Default: 100.
    pub enqueue_timeout_ms: u64,
    /// Requeues allowed per context before it is dropped. `0` = unbounded.
    /// Default: 16.
    pub max_requeues: u32,
    /// Heartbeat period. Default: 30000.
    pub heartbeat_interval_ms: u64,
    /// Connection idle timeout in seconds. `0` = never. Default: 0.
    pub idle_timeout_secs: u64,
    /// Sent to an actor whose input was throttled. `None` = silent drop.
    pub throttle_feedback: Option<String>,
    /// Balance cooldown table.
    pub balance: BalanceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            min_round_interval_ms: 50,
            system_queue_capacity: 100,
            game_queue_capacity: 300,
            input_queue_capacity: 1000,
            max_inputs_per_second: 1,
            throttle_window_ms: 1000,
            enqueue_timeout_ms: 100,
            max_requeues: 16,
            heartbeat_interval_ms: 30_000,
            idle_timeout_secs: 0,
            throttle_feedback: None,
            balance: BalanceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "tick_interval_ms",
            });
        }
        if self.throttle_window_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "throttle_window_ms",
            });
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "heartbeat_interval_ms",
            });
        }
        for (field, cap) in [
            ("system_queue_capacity", self.system_queue_capacity),
            ("game_queue_capacity", self.game_queue_capacity),
            ("input_queue_capacity", self.input_queue_capacity),
        ] {
            if cap == 0 {
                return Err(ConfigError::ZeroCapacity { field });
            }
        }
        if self.max_inputs_per_second == 0 {
            return Err(ConfigError::ZeroRate);
        }
        Ok(())
    }

    /// Ticker period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Minimum spacing between rounds.
    pub fn min_round_interval(&self) -> Duration {
        Duration::from_millis(self.min_round_interval_ms)
    }

    /// Throttle counter reset period.
    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    /// Bounded-wait enqueue timeout.
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Connection idle timeout, or `None` for no timeout.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Requeue bound, or `None` when unbounded.
    pub fn requeue_limit(&self) -> Option<u32> {
        (self.max_requeues > 0).then_some(self.max_requeues)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A period that drives a ticker was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// The offending field.
        field: &'static str,
    },
    /// A bounded queue was given zero capacity.
    #[error("{field} must be at least 1")]
    ZeroCapacity {
        /// The offending field.
        field: &'static str,
    },
    /// `max_inputs_per_second` was zero, which would drop all input.
    #[error("max_inputs_per_second must be at least 1")]
    ZeroRate,
    /// The TOML document did not parse.
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A built-in listener could not be registered.
    #[error("failed to register built-in listener: {0}")]
    Listener(#[from] DispatchError),
    /// The config file could not be read.
    #[error("failed to read engine config from {path:?}: {source}")]
    Read {
        /// The path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A runtime loop thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// The thread name.
        name: &'static str,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}
