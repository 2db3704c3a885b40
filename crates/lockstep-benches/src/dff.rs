//! D flip-flop bench.
//!
//! `dout` takes `din` on the rising edge, so an applied value is only
//! visible one edge later; the monitor samples every second sample point.

use async_trait::async_trait;
use lockstep_core::{
    Device, Driver, Environment, FieldEq, HarnessConfig, HarnessError, Monitor, OutputPort,
    RandomizeError, Transaction,
};
use rand::Rng;

/// Sample points per observation.
pub const CADENCE: u64 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dff {
    pub din: bool,
    /// Synchronous, active high.
    pub rst: bool,
    pub dout: bool,
    pub fault: Option<DffFault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DffFault {
    /// Latch the complement of `din`.
    Inverted,
}

impl Dff {
    pub fn with_fault(fault: Option<DffFault>) -> Self {
        Self {
            fault,
            ..Self::default()
        }
    }
}

impl Device for Dff {
    fn rising_edge(&mut self) {
        self.dout = if self.rst {
            false
        } else {
            match self.fault {
                Some(DffFault::Inverted) => !self.din,
                None => self.din,
            }
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DffTxn {
    pub din: bool,
    pub dout: bool,
}

impl Transaction for DffTxn {
    fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RandomizeError> {
        self.din = rng.gen();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("din", u8::from(self.din).to_string()),
            ("dout", u8::from(self.dout).to_string()),
        ]
    }
}

#[derive(Debug, Default)]
pub struct DffDriver;

#[async_trait]
impl Driver<Dff, DffTxn> for DffDriver {
    fn apply_reset(&mut self, dut: &mut Dff, active: bool) {
        dut.rst = active;
        if active {
            dut.din = false;
        }
    }

    fn apply(&mut self, dut: &mut Dff, item: &mut DffTxn) {
        dut.din = item.din;
    }
}

#[derive(Debug, Default)]
pub struct DffMonitor;

#[async_trait]
impl Monitor<Dff, DffTxn> for DffMonitor {
    async fn observe(&mut self, port: &OutputPort<Dff>) -> Result<DffTxn, HarnessError> {
        port.clock().sample_points(CADENCE).await?;
        Ok(port.sample(|dut| DffTxn {
            din: dut.din,
            dout: dut.dout,
        }))
    }
}

fn reference_din(txn: &DffTxn) -> bool {
    txn.din
}

fn observed_dout(txn: &DffTxn) -> bool {
    txn.dout
}

pub type DffChecker = FieldEq<DffTxn, bool, fn(&DffTxn) -> bool, fn(&DffTxn) -> bool>;

pub fn checker() -> DffChecker {
    FieldEq::new(
        "dout",
        reference_din as fn(&DffTxn) -> bool,
        observed_dout as fn(&DffTxn) -> bool,
    )
}

pub type DffEnv = Environment<Dff, DffTxn, DffDriver, DffMonitor, DffChecker>;

pub fn environment(config: HarnessConfig, fault: Option<DffFault>) -> Result<DffEnv, HarnessError> {
    Environment::new(
        "dff",
        config,
        Dff::with_fault(fault),
        DffDriver,
        DffMonitor,
        checker(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_wins_over_din() {
        let mut dff = Dff {
            din: true,
            rst: true,
            dout: true,
            fault: None,
        };
        dff.rising_edge();
        assert!(!dff.dout);

        dff.rst = false;
        dff.rising_edge();
        assert!(dff.dout);
    }

    #[test]
    fn test_inverted_fault() {
        let mut dff = Dff::with_fault(Some(DffFault::Inverted));
        dff.din = true;
        dff.rising_edge();
        assert!(!dff.dout);
    }

    #[test]
    fn test_render_uses_bits() {
        let txn = DffTxn {
            din: true,
            dout: false,
        };
        assert_eq!(txn.render(lockstep_core::Tag::Mon), "[MON] din:1 dout:0");
    }
}
