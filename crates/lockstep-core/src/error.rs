use crate::config::ConfigError;
use crate::environment::Phase;
use crate::transaction::RandomizeError;

/// Runtime failures of the harness itself.
///
/// Functional mismatches are never reported here; they are counted by the
/// scoreboard and surface in the run report.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("randomization failed: {0}")]
    Randomize(#[from] RandomizeError),

    #[error("channel '{channel}' closed")]
    ChannelClosed { channel: &'static str },

    #[error("clock stopped")]
    ClockStopped,

    #[error("invalid phase: expected {expected:?}, environment is {actual:?}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("agents already consumed by a previous run")]
    AgentsConsumed,

    #[error("agent task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
