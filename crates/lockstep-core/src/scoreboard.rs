//! Scoreboard and pluggable comparison strategies.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;
use crate::diag::{Diagnostics, Tag};
use crate::error::HarnessError;
use crate::event::SyncEvent;
use crate::mailbox::MailboxRx;
use crate::report::RunCounters;
use crate::stop::StopSignal;
use crate::transaction::Transaction;

/// Outcome of checking one observation against its reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch { detail: String },
    /// Nothing to compare: the operation was blocked or is a no-op for the
    /// model.
    Skipped { reason: String },
}

/// Device-specific equivalence rule.
///
/// A checker may keep its own model state (a shadow queue, a register
/// image) and update it on every call.
pub trait Checker<T>: Send + 'static {
    fn check(&mut self, expected: &T, observed: &T) -> Verdict;
}

impl<T, F> Checker<T> for F
where
    F: FnMut(&T, &T) -> Verdict + Send + 'static,
{
    fn check(&mut self, expected: &T, observed: &T) -> Verdict {
        self(expected, observed)
    }
}

/// Compares a value derived from the reference with one read from the
/// observation.
pub struct FieldEq<T, V, E, O> {
    field: &'static str,
    expected: E,
    observed: O,
    _types: PhantomData<fn(&T) -> V>,
}

impl<T, V, E, O> FieldEq<T, V, E, O>
where
    E: Fn(&T) -> V,
    O: Fn(&T) -> V,
{
    pub fn new(field: &'static str, expected: E, observed: O) -> Self {
        Self {
            field,
            expected,
            observed,
            _types: PhantomData,
        }
    }
}

impl<T, V, E, O> Checker<T> for FieldEq<T, V, E, O>
where
    T: 'static,
    V: PartialEq + fmt::Display + 'static,
    E: Fn(&T) -> V + Send + 'static,
    O: Fn(&T) -> V + Send + 'static,
{
    fn check(&mut self, expected: &T, observed: &T) -> Verdict {
        let want = (self.expected)(expected);
        let got = (self.observed)(observed);
        if want == got {
            Verdict::Match
        } else {
            Verdict::Mismatch {
                detail: format!("{} expected:{want} observed:{got}", self.field),
            }
        }
    }
}

/// Pairs observations with references and releases the generator.
pub struct Scoreboard<T, C> {
    pub(crate) checker: C,
    pub(crate) observed: MailboxRx<T>,
    pub(crate) reference: MailboxRx<T>,
    pub(crate) advance: Arc<SyncEvent>,
    pub(crate) clock: Clock,
    pub(crate) diag: Diagnostics,
    pub(crate) counters: Arc<RunCounters>,
}

impl<T: Transaction, C: Checker<T>> Scoreboard<T, C> {
    pub async fn run(mut self, mut stop: StopSignal) -> Result<(), HarnessError> {
        loop {
            // Pairing is positional: the n-th observation goes with the n-th
            // reference.
            let Some(observed) = stop.guard(self.observed.recv()).await else {
                return Ok(());
            };
            let observed = observed?;
            let Some(expected) = stop.guard(self.reference.recv()).await else {
                return Ok(());
            };
            let expected = expected?;

            let cycle = self.clock.cycle();
            self.diag.emit(Tag::Ref, cycle, expected.render(Tag::Ref));

            let line = match self.checker.check(&expected, &observed) {
                Verdict::Match => {
                    self.counters.record_match();
                    "[SCO] result:match".to_string()
                }
                Verdict::Mismatch { detail } => {
                    let errors = self.counters.record_mismatch();
                    warn!(cycle, %detail, errors, "scoreboard mismatch");
                    format!("[SCO] result:mismatch {detail} errors:{errors}")
                }
                Verdict::Skipped { reason } => {
                    self.counters.record_skip();
                    format!("[SCO] result:skipped reason:{reason}")
                }
            };
            self.diag.emit(Tag::Sco, cycle, line);

            self.advance.fire();
        }
    }
}
