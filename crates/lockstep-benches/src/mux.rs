//! 4:1 multiplexer bench.
//!
//! `y` follows the selected data input combinationally, so the monitor
//! samples once per cycle.

use async_trait::async_trait;
use lockstep_core::constraint::IntRange;
use lockstep_core::{
    Device, Driver, Environment, FieldEq, HarnessConfig, HarnessError, Monitor, OutputPort,
    RandomizeError, Transaction,
};
use rand::Rng;

const SEL: IntRange<u8> = IntRange::new("sel", 0, 3);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mux4 {
    pub sel: u8,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub y: u8,
    /// When set, the select lines read as this value regardless of `sel`.
    pub stuck_select: Option<u8>,
}

impl Mux4 {
    pub fn with_fault(fault: Option<MuxFault>) -> Self {
        Self {
            stuck_select: fault.map(|MuxFault::StuckSelect(sel)| sel & 0b11),
            ..Self::default()
        }
    }
}

impl Device for Mux4 {
    fn rising_edge(&mut self) {}

    fn settle(&mut self) {
        let sel = self.stuck_select.unwrap_or(self.sel);
        self.y = select(sel, [self.a, self.b, self.c, self.d]);
    }
}

fn select(sel: u8, inputs: [u8; 4]) -> u8 {
    inputs[usize::from(sel & 0b11)]
}

/// Injectable defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxFault {
    StuckSelect(u8),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MuxTxn {
    pub sel: u8,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub y: u8,
}

impl MuxTxn {
    /// Output a correct mux produces for these inputs.
    pub fn expected_y(&self) -> u8 {
        select(self.sel, [self.a, self.b, self.c, self.d])
    }
}

impl Transaction for MuxTxn {
    fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RandomizeError> {
        self.sel = SEL.pick(rng)?;
        self.a = rng.gen();
        self.b = rng.gen();
        self.c = rng.gen();
        self.d = rng.gen();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sel", self.sel.to_string()),
            ("a", self.a.to_string()),
            ("b", self.b.to_string()),
            ("c", self.c.to_string()),
            ("d", self.d.to_string()),
            ("y", self.y.to_string()),
        ]
    }
}

#[derive(Debug, Default)]
pub struct MuxDriver;

#[async_trait]
impl Driver<Mux4, MuxTxn> for MuxDriver {
    // No reset pin; reset parks the data inputs at zero.
    fn apply_reset(&mut self, dut: &mut Mux4, active: bool) {
        if active {
            dut.sel = 0;
            dut.a = 0;
            dut.b = 0;
            dut.c = 0;
            dut.d = 0;
        }
    }

    fn apply(&mut self, dut: &mut Mux4, item: &mut MuxTxn) {
        dut.sel = item.sel;
        dut.a = item.a;
        dut.b = item.b;
        dut.c = item.c;
        dut.d = item.d;
    }
}

#[derive(Debug, Default)]
pub struct MuxMonitor;

#[async_trait]
impl Monitor<Mux4, MuxTxn> for MuxMonitor {
    async fn observe(&mut self, port: &OutputPort<Mux4>) -> Result<MuxTxn, HarnessError> {
        port.clock().sample_point().await?;
        Ok(port.sample(|dut| MuxTxn {
            sel: dut.sel,
            a: dut.a,
            b: dut.b,
            c: dut.c,
            d: dut.d,
            y: dut.y,
        }))
    }
}

fn observed_y(txn: &MuxTxn) -> u8 {
    txn.y
}

pub type MuxChecker = FieldEq<MuxTxn, u8, fn(&MuxTxn) -> u8, fn(&MuxTxn) -> u8>;

pub fn checker() -> MuxChecker {
    FieldEq::new(
        "y",
        MuxTxn::expected_y as fn(&MuxTxn) -> u8,
        observed_y as fn(&MuxTxn) -> u8,
    )
}

pub type MuxEnv = Environment<Mux4, MuxTxn, MuxDriver, MuxMonitor, MuxChecker>;

pub fn environment(config: HarnessConfig, fault: Option<MuxFault>) -> Result<MuxEnv, HarnessError> {
    Environment::new(
        "mux",
        config,
        Mux4::with_fault(fault),
        MuxDriver,
        MuxMonitor,
        checker(),
    )
}
