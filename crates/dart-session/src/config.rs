use std::time::Duration;

use analysis::{ConfigError, OneEuroConfig, ScoringTable, ValidatorConfig};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Throw and round lifecycle tunables. Changes apply immediately, including
/// to the throw in progress.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    max_throws_per_round: u32,
    auto_stop_delay_ms: u64,
    min_throw_duration_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_throws_per_round: 3,
            auto_stop_delay_ms: 3000,
            min_throw_duration_ms: 1000,
        }
    }
}

impl LifecycleConfig {
    pub fn max_throws_per_round(&self) -> u32 {
        self.max_throws_per_round
    }

    pub fn auto_stop_delay(&self) -> Duration {
        Duration::from_millis(self.auto_stop_delay_ms)
    }

    pub fn min_throw_duration(&self) -> Duration {
        Duration::from_millis(self.min_throw_duration_ms)
    }

    pub fn set_max_throws_per_round(&mut self, n: u32) -> Result<(), ConfigError> {
        if n == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_throws_per_round",
                constraint: ">= 1",
                value: 0.0,
            });
        }
        self.max_throws_per_round = n;
        Ok(())
    }

    pub fn set_auto_stop_delay(&mut self, d: Duration) -> Result<(), ConfigError> {
        if d.as_millis() == 0 {
            return Err(ConfigError::OutOfRange {
                field: "auto_stop_delay",
                constraint: ">= 1 ms",
                value: 0.0,
            });
        }
        self.auto_stop_delay_ms = d.as_millis() as u64;
        Ok(())
    }

    pub fn set_min_throw_duration(&mut self, d: Duration) {
        self.min_throw_duration_ms = d.as_millis() as u64;
    }
}

/// Everything the engine is tuned with. Passed to the session at construction.
///
/// Filter, validator and zone changes take effect when the next throw starts.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub filter: OneEuroConfig,
    pub validator: ValidatorConfig,
    pub lifecycle: LifecycleConfig,
    pub zones: ScoringTable,
}

impl EngineConfig {
    /// Partial documents are fine; missing sections keep their defaults.
    pub fn from_json(s: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(s)?)
    }
}
