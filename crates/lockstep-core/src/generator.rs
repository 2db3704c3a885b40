use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::RandomizeFailurePolicy;
use crate::diag::{Diagnostics, Tag};
use crate::error::HarnessError;
use crate::event::SyncEvent;
use crate::mailbox::MailboxTx;
use crate::report::RunCounters;
use crate::stimulus::StimulusSource;
use crate::stop::StopSignal;
use crate::transaction::Transaction;

/// Produces `count` transactions, one at a time.
///
/// Each item goes to the driver and, as a separate copy, to the scoreboard.
/// The generator then waits on `advance` until the scoreboard has checked
/// the item, and fires `done` once after the last one.
pub struct Generator<T> {
    pub(crate) stimulus: Box<dyn StimulusSource<T>>,
    pub(crate) count: u64,
    pub(crate) policy: RandomizeFailurePolicy,
    pub(crate) to_driver: MailboxTx<T>,
    pub(crate) to_scoreboard: MailboxTx<T>,
    pub(crate) advance: Arc<SyncEvent>,
    pub(crate) done: Arc<SyncEvent>,
    pub(crate) clock: Clock,
    pub(crate) diag: Diagnostics,
    pub(crate) counters: Arc<RunCounters>,
}

impl<T: Transaction> Generator<T> {
    pub async fn run(mut self, mut stop: StopSignal) -> Result<(), HarnessError> {
        for iteration in 0..self.count {
            let item = match self.stimulus.next_item() {
                Ok(item) => item,
                Err(err) => {
                    self.counters.record_randomize_failure();
                    warn!(iteration, error = %err, policy = ?self.policy, "randomization failed");
                    self.diag.emit(
                        Tag::Gen,
                        self.clock.cycle(),
                        format!("[GEN] iteration:{iteration} randomize:failed reason:{err}"),
                    );
                    match self.policy {
                        RandomizeFailurePolicy::Skip => continue,
                        RandomizeFailurePolicy::Abort => {
                            self.done.fire();
                            return Err(err.into());
                        }
                    }
                }
            };

            // Armed before sending: the scoreboard may answer before we await.
            let advance = self.advance.arm();
            self.to_driver.send(item.clone())?;
            self.to_scoreboard.send(item.clone())?;
            self.counters.record_generated();
            self.diag
                .emit(Tag::Gen, self.clock.cycle(), item.render(Tag::Gen));

            if stop.guard(advance).await.is_none() {
                debug!(iteration, "generator stopped while waiting for advance");
                return Ok(());
            }
        }

        self.done.fire();
        debug!(count = self.count, "generator done");
        Ok(())
    }
}
