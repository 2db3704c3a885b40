//! Run counters and the final report.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters shared by the agents of one run.
#[derive(Debug, Default)]
pub struct RunCounters {
    generated: AtomicU64,
    randomize_failures: AtomicU64,
    driven: AtomicU64,
    observed: AtomicU64,
    compared: AtomicU64,
    matched: AtomicU64,
    mismatched: AtomicU64,
    skipped: AtomicU64,
}

impl RunCounters {
    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_randomize_failure(&self) {
        self.randomize_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_driven(&self) {
        self.driven.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_observed(&self) {
        self.observed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_match(&self) {
        self.compared.fetch_add(1, Ordering::SeqCst);
        self.matched.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the error count including this mismatch.
    pub fn record_mismatch(&self) -> u64 {
        self.compared.fetch_add(1, Ordering::SeqCst);
        self.mismatched.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_skip(&self) {
        self.compared.fetch_add(1, Ordering::SeqCst);
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn errors(&self) -> u64 {
        self.mismatched.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            generated: self.generated.load(Ordering::SeqCst),
            randomize_failures: self.randomize_failures.load(Ordering::SeqCst),
            driven: self.driven.load(Ordering::SeqCst),
            observed: self.observed.load(Ordering::SeqCst),
            compared: self.compared.load(Ordering::SeqCst),
            matched: self.matched.load(Ordering::SeqCst),
            mismatched: self.mismatched.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub generated: u64,
    pub randomize_failures: u64,
    pub driven: u64,
    pub observed: u64,
    /// Reference/observation pairs processed by the scoreboard.
    pub compared: u64,
    pub matched: u64,
    pub mismatched: u64,
    /// Pairs with nothing to compare (blocked or illegal operations).
    pub skipped: u64,
}

/// Why the running phase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The generator produced every requested transaction.
    Completed,
    /// The generator aborted on a randomization failure.
    RandomizeFailed { reason: String },
    /// Another agent ended first, which only happens on an infrastructure fault.
    AgentFailed { agent: String, error: String },
}

/// Final results of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub bench: String,
    pub iterations: u64,
    pub seed: u64,
    pub counts: CounterSnapshot,
    /// Functional mismatches.
    pub errors: u64,
    /// Rising edges from time zero to teardown.
    pub final_cycle: u64,
    /// Largest number of transactions ever queued for the driver.
    pub max_in_flight: usize,
    pub stop_reason: StopReason,
    /// Diagnostic lines per tag.
    pub diagnostics: BTreeMap<String, u64>,
}

impl RunReport {
    /// No mismatches, a completed run, and at least one transaction if any
    /// failed to randomize. A skip-everything run checked nothing and fails.
    pub fn passed(&self) -> bool {
        let all_skipped = self.counts.generated == 0 && self.counts.randomize_failures > 0;
        self.errors == 0 && self.stop_reason == StopReason::Completed && !all_skipped
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        writeln!(
            f,
            "{verdict} {} seed:{} iterations:{}",
            self.bench, self.seed, self.iterations
        )?;
        writeln!(
            f,
            "  generated:{} compared:{} matched:{} skipped:{} errors:{}",
            self.counts.generated,
            self.counts.compared,
            self.counts.matched,
            self.counts.skipped,
            self.errors
        )?;
        if self.counts.randomize_failures > 0 {
            writeln!(
                f,
                "  randomize failures:{}",
                self.counts.randomize_failures
            )?;
        }
        write!(
            f,
            "  cycles:{} max in flight:{} stop:{:?}",
            self.final_cycle, self.max_in_flight, self.stop_reason
        )
    }
}
