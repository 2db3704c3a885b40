//! Transaction-level verification harness.
//!
//! A generator produces stimulus, a driver applies it to a device model, a
//! monitor samples the device, and a scoreboard checks each observation
//! against the reference copy of the stimulus. The generator waits for the
//! scoreboard after every item, so exactly one transaction is in flight.

pub mod clock;
pub mod config;
pub mod constraint;
pub mod device;
pub mod diag;
pub mod driver;
pub mod environment;
pub mod error;
pub mod event;
pub mod generator;
pub mod mailbox;
pub mod monitor;
pub mod report;
pub mod scoreboard;
pub mod stimulus;
pub mod stop;
pub mod transaction;

pub use config::{ClockConfig, HarnessConfig, RandomizeFailurePolicy};
pub use device::{Device, DeviceHandle, InputPort, OutputPort};
pub use diag::{Diagnostics, Tag};
pub use driver::Driver;
pub use environment::{Environment, Phase};
pub use error::HarnessError;
pub use monitor::Monitor;
pub use report::{RunReport, StopReason};
pub use scoreboard::{Checker, FieldEq, Verdict};
pub use stimulus::{RandomStimulus, ScriptedStimulus, StimulusSource};
pub use transaction::{RandomizeError, Transaction};
