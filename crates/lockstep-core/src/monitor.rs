use std::sync::Arc;

use async_trait::async_trait;

use crate::device::{Device, OutputPort};
use crate::diag::{Diagnostics, Tag};
use crate::error::HarnessError;
use crate::mailbox::MailboxTx;
use crate::report::RunCounters;
use crate::stop::StopSignal;
use crate::transaction::Transaction;

/// Samples a device on its own cadence, independent of the driver.
#[async_trait]
pub trait Monitor<D: Device, T: Transaction>: Send + 'static {
    /// Wait out the device's sampling cadence and return a freshly built
    /// observation. Never reuse an instance across calls.
    async fn observe(&mut self, port: &OutputPort<D>) -> Result<T, HarnessError>;
}

pub(crate) async fn run_monitor<D, T, Mon>(
    mut monitor: Mon,
    port: OutputPort<D>,
    outbox: MailboxTx<T>,
    diag: Diagnostics,
    counters: Arc<RunCounters>,
    mut stop: StopSignal,
) -> Result<(), HarnessError>
where
    D: Device,
    T: Transaction,
    Mon: Monitor<D, T>,
{
    loop {
        let Some(observed) = stop.guard(monitor.observe(&port)).await else {
            return Ok(());
        };
        let item = observed?;
        let line = item.render(Tag::Mon);
        outbox.send(item)?;
        counters.record_observed();
        diag.emit(Tag::Mon, port.clock().cycle(), line);
    }
}
