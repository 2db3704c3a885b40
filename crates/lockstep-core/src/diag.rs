//! Diagnostics sink.
//!
//! Every agent reports one tagged line per transaction. Lines are mirrored
//! to `tracing` under the `lockstep::diag` target and, when recording is
//! enabled, kept in memory so tests and reports can inspect them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Component that emitted a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    Gen,
    Drv,
    Mon,
    Sco,
    Ref,
    /// Reset sequence; kept apart from the per-transaction `DRV` lines.
    Rst,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Gen => "GEN",
            Tag::Drv => "DRV",
            Tag::Mon => "MON",
            Tag::Sco => "SCO",
            Tag::Ref => "REF",
            Tag::Rst => "RST",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded diagnostic line.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagRecord {
    pub tag: Tag,
    /// Clock cycle when the line was emitted.
    pub cycle: u64,
    pub line: String,
}

#[derive(Debug, Default)]
struct DiagLog {
    records: Vec<DiagRecord>,
    counts: BTreeMap<Tag, u64>,
}

/// Shared handle to the run's diagnostic log.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    log: Arc<Mutex<DiagLog>>,
    record: bool,
}

impl Diagnostics {
    pub fn new(record: bool) -> Self {
        Self {
            log: Arc::default(),
            record,
        }
    }

    pub fn emit(&self, tag: Tag, cycle: u64, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "lockstep::diag", tag = tag.as_str(), cycle, "{line}");

        let mut log = self.lock();
        *log.counts.entry(tag).or_insert(0) += 1;
        if self.record {
            log.records.push(DiagRecord { tag, cycle, line });
        }
    }

    /// Number of lines emitted with `tag`.
    pub fn count(&self, tag: Tag) -> u64 {
        self.lock().counts.get(&tag).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> BTreeMap<Tag, u64> {
        self.lock().counts.clone()
    }

    /// Recorded lines, oldest first. Empty when recording is off.
    pub fn records(&self) -> Vec<DiagRecord> {
        self.lock().records.clone()
    }

    pub fn records_for(&self, tag: Tag) -> Vec<DiagRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, DiagLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_tag() {
        let diag = Diagnostics::new(true);
        diag.emit(Tag::Gen, 1, "[GEN] a:1");
        diag.emit(Tag::Gen, 2, "[GEN] a:2");
        diag.emit(Tag::Sco, 2, "[SCO] result:match");

        assert_eq!(diag.count(Tag::Gen), 2);
        assert_eq!(diag.count(Tag::Sco), 1);
        assert_eq!(diag.count(Tag::Mon), 0);
        assert_eq!(diag.records_for(Tag::Gen)[1].line, "[GEN] a:2");
    }

    #[test]
    fn test_counts_kept_without_recording() {
        let diag = Diagnostics::new(false);
        diag.emit(Tag::Mon, 0, "[MON] y:3");

        assert_eq!(diag.count(Tag::Mon), 1);
        assert!(diag.records().is_empty());
    }

    #[test]
    fn test_clones_share_the_log() {
        let diag = Diagnostics::new(true);
        let other = diag.clone();
        other.emit(Tag::Ref, 4, "[REF] din:1");

        assert_eq!(diag.count(Tag::Ref), 1);
        assert_eq!(diag.records()[0].cycle, 4);
    }
}
