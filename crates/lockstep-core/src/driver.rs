use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::device::{Device, InputPort};
use crate::diag::{Diagnostics, Tag};
use crate::error::HarnessError;
use crate::mailbox::MailboxRx;
use crate::report::RunCounters;
use crate::stop::StopSignal;
use crate::transaction::Transaction;

/// Applies transactions to a device's inputs.
///
/// Inputs change only at falling edges, so they are stable at the next
/// sample point and rising edge.
#[async_trait]
pub trait Driver<D: Device, T: Transaction>: Send + 'static {
    /// Set or clear the device's reset input. A driver that asserts reset
    /// should also park the other inputs at their idle values.
    fn apply_reset(&mut self, dut: &mut D, active: bool);

    /// Copy the transaction's input fields onto the device. May record what
    /// was actually driven back into `item`.
    fn apply(&mut self, dut: &mut D, item: &mut T);

    /// Hold the applied inputs for as long as the device needs them. The
    /// default holds them through one rising edge.
    async fn hold(&mut self, port: &InputPort<D>) -> Result<(), HarnessError> {
        port.clock().rising().await?;
        Ok(())
    }

    /// Reset sequence: assert reset at a falling edge, hold it for `cycles`
    /// rising edges, release it at the next falling edge and let one more
    /// rising edge pass.
    async fn reset(&mut self, port: &InputPort<D>, cycles: u64) -> Result<(), HarnessError> {
        let clock = port.clock();
        clock.falling().await?;
        port.drive(|dut| self.apply_reset(dut, true));
        clock.rising_edges(cycles).await?;
        clock.falling().await?;
        port.drive(|dut| self.apply_reset(dut, false));
        clock.rising().await?;
        Ok(())
    }
}

pub(crate) async fn run_driver<D, T, Drv>(
    mut driver: Drv,
    port: InputPort<D>,
    mut inbox: MailboxRx<T>,
    diag: Diagnostics,
    counters: Arc<RunCounters>,
    mut stop: StopSignal,
) -> Result<(), HarnessError>
where
    D: Device,
    T: Transaction,
    Drv: Driver<D, T>,
{
    loop {
        let Some(received) = stop.guard(inbox.recv()).await else {
            return Ok(());
        };
        let Ok(mut item) = received else {
            // The generator finished and dropped its end.
            debug!("driver inbox closed");
            return Ok(());
        };

        let Some(edge) = stop.guard(port.clock().falling()).await else {
            return Ok(());
        };
        edge?;
        port.drive(|dut| driver.apply(dut, &mut item));
        counters.record_driven();
        diag.emit(Tag::Drv, port.clock().cycle(), item.render(Tag::Drv));

        let Some(held) = stop.guard(driver.hold(&port)).await else {
            return Ok(());
        };
        held?;
    }
}
