//! Run configuration.
//!
//! Everything a run needs besides the device and its agents: how many
//! transactions to generate, the seed, clock timing and what to do when a
//! transaction cannot be randomized.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Shortest clock period that still puts the falling edge, the sample point
/// and the rising edge on three distinct instants.
pub const MIN_PERIOD_MS: u64 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What the generator does when a transaction cannot be randomized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomizeFailurePolicy {
    /// Stop generating and end the run with the failure as stop reason.
    #[default]
    Abort,
    /// Report the failure and move on to the next iteration.
    Skip,
}

/// Clock timing in simulated milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Length of one clock cycle.
    pub period_ms: u64,
    /// Rising edges the driver holds reset active for.
    pub reset_cycles: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            reset_cycles: 5,
        }
    }
}

/// Configuration for one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Number of transactions the generator produces.
    pub iterations: u64,
    /// Seed for every random stream of the run.
    pub seed: u64,
    pub on_randomize_failure: RandomizeFailurePolicy,
    pub clock: ClockConfig,
    /// Keep diagnostic lines in memory (counts are always kept).
    pub record_diagnostics: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            seed: 42,
            on_randomize_failure: RandomizeFailurePolicy::Abort,
            clock: ClockConfig::default(),
            record_diagnostics: true,
        }
    }
}

impl HarnessConfig {
    /// Default configuration with the given iteration count.
    pub fn with_iterations(iterations: u64) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.period_ms < MIN_PERIOD_MS {
            return Err(ConfigError::Invalid(format!(
                "clock period {}ms is below the minimum of {MIN_PERIOD_MS}ms",
                self.clock.period_ms
            )));
        }
        if self.clock.reset_cycles == 0 {
            return Err(ConfigError::Invalid(
                "reset must be held for at least one cycle".to_string(),
            ));
        }
        Ok(())
    }
}
