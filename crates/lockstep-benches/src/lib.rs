//! Concrete benches built on `lockstep-core`: a 4:1 mux, a D flip-flop and a
//! synchronous FIFO.

pub mod dff;
pub mod fifo;
pub mod mux;

use std::fmt;
use std::str::FromStr;

use lockstep_core::{HarnessConfig, HarnessError, RunReport};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
#[error("unknown bench '{0}' (expected mux, dff or fifo)")]
pub struct UnknownBench(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchKind {
    Mux,
    Dff,
    Fifo,
}

impl BenchKind {
    pub const ALL: [BenchKind; 3] = [BenchKind::Mux, BenchKind::Dff, BenchKind::Fifo];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchKind::Mux => "mux",
            BenchKind::Dff => "dff",
            BenchKind::Fifo => "fifo",
        }
    }
}

impl fmt::Display for BenchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchKind {
    type Err = UnknownBench;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BenchKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownBench(s.to_string()))
    }
}

/// Run one bench to completion. With `inject_fault` the device carries its
/// bench's defect, so a long enough run reports mismatches.
pub async fn run_bench(
    kind: BenchKind,
    config: HarnessConfig,
    inject_fault: bool,
) -> Result<RunReport, HarnessError> {
    tracing::info!(
        bench = %kind,
        iterations = config.iterations,
        seed = config.seed,
        inject_fault,
        "starting bench"
    );
    match kind {
        BenchKind::Mux => {
            let fault = inject_fault.then_some(mux::MuxFault::StuckSelect(0));
            mux::environment(config, fault)?.run().await
        }
        BenchKind::Dff => {
            let fault = inject_fault.then_some(dff::DffFault::Inverted);
            dff::environment(config, fault)?.run().await
        }
        BenchKind::Fifo => {
            let fault = inject_fault.then_some(fifo::FifoFault::CorruptRead(0x5a));
            fifo::environment(config, fault)?.run().await
        }
    }
}
