//! Synchronous FIFO bench.
//!
//! One write or read intent per transaction. Flags are sampled before the
//! edge that performs the operation; the registered `dout` one sample point
//! later.

use std::collections::VecDeque;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use lockstep_core::constraint::{IntRange, WeightedChoice};
use lockstep_core::{
    Checker, Device, Driver, Environment, HarnessConfig, HarnessError, InputPort, Monitor,
    OutputPort, RandomizeError, Transaction, Verdict,
};
use rand::Rng;
use serde::Serialize;

pub const DEPTH: usize = 16;

const DIN: IntRange<u8> = IntRange::new("din", 0, u8::MAX);

/// Write/read intent, 50/50.
fn op_choice() -> &'static WeightedChoice<FifoOp> {
    static OP: OnceLock<WeightedChoice<FifoOp>> = OnceLock::new();
    OP.get_or_init(|| WeightedChoice::new("op", [(FifoOp::Write, 50), (FifoOp::Read, 50)]))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FifoOp {
    #[default]
    Write,
    Read,
}

impl fmt::Display for FifoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FifoOp::Write => "write",
            FifoOp::Read => "read",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoFault {
    /// XOR every value leaving the queue with this mask.
    CorruptRead(u8),
}

#[derive(Debug, Clone, Default)]
pub struct SyncFifo {
    pub wr: bool,
    pub rd: bool,
    pub din: u8,
    pub rst: bool,
    pub dout: u8,
    pub full: bool,
    pub empty: bool,
    queue: VecDeque<u8>,
    fault: Option<FifoFault>,
}

impl SyncFifo {
    pub fn with_fault(fault: Option<FifoFault>) -> Self {
        Self {
            fault,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Device for SyncFifo {
    fn rising_edge(&mut self) {
        if self.rst {
            self.queue.clear();
            self.dout = 0;
            return;
        }
        // Both strobes act on the state before the edge.
        let (full, empty) = (self.queue.len() >= DEPTH, self.queue.is_empty());
        if self.rd && !empty {
            if let Some(value) = self.queue.pop_front() {
                self.dout = match self.fault {
                    Some(FifoFault::CorruptRead(mask)) => value ^ mask,
                    None => value,
                };
            }
        }
        if self.wr && !full {
            self.queue.push_back(self.din);
        }
    }

    fn settle(&mut self) {
        self.full = self.queue.len() >= DEPTH;
        self.empty = self.queue.is_empty();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FifoTxn {
    pub op: FifoOp,
    pub din: u8,
    pub wr: bool,
    pub rd: bool,
    pub dout: u8,
    pub full: bool,
    pub empty: bool,
}

impl FifoTxn {
    pub fn write(din: u8) -> Self {
        Self {
            op: FifoOp::Write,
            din,
            ..Self::default()
        }
    }

    pub fn read() -> Self {
        Self {
            op: FifoOp::Read,
            ..Self::default()
        }
    }
}

impl Transaction for FifoTxn {
    fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RandomizeError> {
        self.op = op_choice().pick(rng)?;
        self.din = DIN.pick(rng)?;
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("op", self.op.to_string()),
            ("din", self.din.to_string()),
            ("wr", self.wr.to_string()),
            ("rd", self.rd.to_string()),
            ("dout", self.dout.to_string()),
            ("full", self.full.to_string()),
            ("empty", self.empty.to_string()),
        ]
    }
}

#[derive(Debug, Default)]
pub struct FifoDriver;

#[async_trait]
impl Driver<SyncFifo, FifoTxn> for FifoDriver {
    fn apply_reset(&mut self, dut: &mut SyncFifo, active: bool) {
        dut.rst = active;
        if active {
            dut.wr = false;
            dut.rd = false;
            dut.din = 0;
        }
    }

    fn apply(&mut self, dut: &mut SyncFifo, item: &mut FifoTxn) {
        item.wr = item.op == FifoOp::Write;
        item.rd = item.op == FifoOp::Read;
        dut.wr = item.wr;
        dut.rd = item.rd;
        dut.din = item.din;
    }

    /// Strobes are single-cycle pulses.
    async fn hold(&mut self, port: &InputPort<SyncFifo>) -> Result<(), HarnessError> {
        port.clock().rising().await?;
        port.drive(|dut| {
            dut.wr = false;
            dut.rd = false;
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FifoMonitor;

#[async_trait]
impl Monitor<SyncFifo, FifoTxn> for FifoMonitor {
    async fn observe(&mut self, port: &OutputPort<SyncFifo>) -> Result<FifoTxn, HarnessError> {
        port.clock().sample_point().await?;
        let mut txn = port.sample(|dut| FifoTxn {
            op: if dut.rd { FifoOp::Read } else { FifoOp::Write },
            din: dut.din,
            wr: dut.wr,
            rd: dut.rd,
            dout: 0,
            full: dut.full,
            empty: dut.empty,
        });
        port.clock().sample_point().await?;
        txn.dout = port.sample(|dut| dut.dout);
        Ok(txn)
    }
}

/// Reference model: a shadow queue fed by accepted writes and drained by
/// accepted reads. Acceptance follows the flags the device reported.
#[derive(Debug, Default)]
pub struct ShadowFifoChecker {
    shadow: VecDeque<u8>,
}

impl ShadowFifoChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shadow_len(&self) -> usize {
        self.shadow.len()
    }
}

impl Checker<FifoTxn> for ShadowFifoChecker {
    fn check(&mut self, expected: &FifoTxn, observed: &FifoTxn) -> Verdict {
        match expected.op {
            FifoOp::Write if observed.full => Verdict::Skipped {
                reason: "write blocked by full".to_string(),
            },
            FifoOp::Write => {
                self.shadow.push_back(expected.din);
                Verdict::Match
            }
            FifoOp::Read if observed.empty => Verdict::Skipped {
                reason: "read blocked by empty".to_string(),
            },
            FifoOp::Read => match self.shadow.pop_front() {
                None => Verdict::Skipped {
                    reason: "read with empty shadow queue".to_string(),
                },
                Some(want) if want == observed.dout => Verdict::Match,
                Some(want) => Verdict::Mismatch {
                    detail: format!("dout expected:{want} observed:{}", observed.dout),
                },
            },
        }
    }
}

pub type FifoEnv = Environment<SyncFifo, FifoTxn, FifoDriver, FifoMonitor, ShadowFifoChecker>;

pub fn environment(config: HarnessConfig, fault: Option<FifoFault>) -> Result<FifoEnv, HarnessError> {
    Environment::new(
        "fifo",
        config,
        SyncFifo::with_fault(fault),
        FifoDriver,
        FifoMonitor,
        ShadowFifoChecker::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn observed(dout: u8, full: bool, empty: bool) -> FifoTxn {
        FifoTxn {
            dout,
            full,
            empty,
            ..FifoTxn::default()
        }
    }

    #[test]
    fn test_fifo_order_and_flags() {
        let mut fifo = SyncFifo::default();
        fifo.settle();
        assert!(fifo.empty);

        for value in [4, 7] {
            fifo.wr = true;
            fifo.din = value;
            fifo.rising_edge();
            fifo.settle();
        }
        fifo.wr = false;
        assert!(!fifo.empty);

        fifo.rd = true;
        fifo.rising_edge();
        assert_eq!(fifo.dout, 4);
        fifo.rising_edge();
        fifo.settle();
        assert_eq!(fifo.dout, 7);
        assert!(fifo.empty);
    }

    #[test]
    fn test_full_blocks_writes() {
        let mut fifo = SyncFifo::default();
        fifo.wr = true;
        for value in 0..=DEPTH as u8 {
            fifo.din = value;
            fifo.rising_edge();
            fifo.settle();
        }
        assert!(fifo.full);
        assert_eq!(fifo.len(), DEPTH);
    }

    #[test]
    fn test_reset_clears_queue() {
        let mut fifo = SyncFifo::default();
        fifo.wr = true;
        fifo.din = 9;
        fifo.rising_edge();
        fifo.wr = false;
        fifo.rst = true;
        fifo.rising_edge();
        fifo.settle();
        assert!(fifo.is_empty());
        assert!(fifo.empty);
        assert_eq!(fifo.dout, 0);
    }

    #[test]
    fn test_shadow_checker_counts_data_mismatches() {
        let script = [
            (FifoTxn::write(4), observed(0, false, true)),
            (FifoTxn::write(7), observed(0, false, false)),
            (FifoTxn::read(), observed(4, false, false)),
            // Corrupted read.
            (FifoTxn::read(), observed(8, false, false)),
            // Blocked by empty: no comparison.
            (FifoTxn::read(), observed(0, false, true)),
            (FifoTxn::write(1), observed(0, true, false)),
        ];

        let mut checker = ShadowFifoChecker::new();
        let verdicts: Vec<Verdict> = script
            .iter()
            .map(|(expected, seen)| checker.check(expected, seen))
            .collect();

        let mismatches = verdicts
            .iter()
            .filter(|v| matches!(v, Verdict::Mismatch { .. }))
            .count();
        assert_eq!(mismatches, 1);
        assert_eq!(
            verdicts[3],
            Verdict::Mismatch {
                detail: "dout expected:7 observed:8".to_string()
            }
        );
        assert!(matches!(verdicts[4], Verdict::Skipped { .. }));
        assert!(matches!(verdicts[5], Verdict::Skipped { .. }));
        assert_eq!(checker.shadow_len(), 0);
    }

    #[test]
    fn test_read_on_empty_shadow_is_skipped() {
        let mut checker = ShadowFifoChecker::new();
        let verdict = checker.check(&FifoTxn::read(), &observed(3, false, false));
        assert!(matches!(verdict, Verdict::Skipped { .. }));
    }

    #[test]
    fn test_op_choice_is_built_once() {
        assert!(std::ptr::eq(op_choice(), op_choice()));
    }

    #[test]
    fn test_randomize_draws_both_ops() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut writes = 0;
        for _ in 0..200 {
            let mut txn = FifoTxn::default();
            txn.randomize(&mut rng).unwrap();
            if txn.op == FifoOp::Write {
                writes += 1;
            }
        }
        assert!((60..140).contains(&writes), "writes: {writes}");
    }
}
