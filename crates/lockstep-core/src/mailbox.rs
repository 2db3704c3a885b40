//! Unbounded single-producer/single-consumer mailboxes.
//!
//! `send` never blocks; `recv` suspends until an item arrives. Back-pressure
//! comes from the generator's advance handshake, not from capacity, so each
//! mailbox keeps a high-water mark to make that visible.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::HarnessError;

/// Names of the three mailboxes an environment wires.
pub const GEN_TO_DRV: &str = "gen->drv";
pub const GEN_TO_SCO: &str = "gen->sco";
pub const MON_TO_SCO: &str = "mon->sco";

#[derive(Debug, Default)]
struct Depth {
    current: AtomicUsize,
    high_water: AtomicUsize,
}

/// Read-only view of a mailbox's occupancy.
#[derive(Debug, Clone)]
pub struct MailboxProbe {
    name: &'static str,
    depth: Arc<Depth>,
}

impl MailboxProbe {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Items sent but not yet received.
    pub fn depth(&self) -> usize {
        self.depth.current.load(Ordering::SeqCst)
    }

    /// Largest depth ever reached.
    pub fn high_water(&self) -> usize {
        self.depth.high_water.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MailboxTx<T> {
    tx: UnboundedSender<T>,
    probe: MailboxProbe,
}

#[derive(Debug)]
pub struct MailboxRx<T> {
    rx: UnboundedReceiver<T>,
    probe: MailboxProbe,
}

/// Create a named mailbox.
pub fn mailbox<T>(name: &'static str) -> (MailboxTx<T>, MailboxRx<T>) {
    let (tx, rx) = unbounded_channel();
    let probe = MailboxProbe {
        name,
        depth: Arc::default(),
    };
    (
        MailboxTx {
            tx,
            probe: probe.clone(),
        },
        MailboxRx { rx, probe },
    )
}

impl<T> MailboxTx<T> {
    /// Enqueue an item. Fails only if the receiving agent is gone.
    pub fn send(&self, item: T) -> Result<(), HarnessError> {
        let depth = &self.probe.depth;
        // Count before sending so a fast receiver never sees a negative depth.
        let now = depth.current.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(item).is_err() {
            depth.current.fetch_sub(1, Ordering::SeqCst);
            return Err(HarnessError::ChannelClosed {
                channel: self.probe.name,
            });
        }
        depth.high_water.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }

    pub fn probe(&self) -> MailboxProbe {
        self.probe.clone()
    }
}

impl<T> MailboxRx<T> {
    /// Wait for the next item, in send order.
    pub async fn recv(&mut self) -> Result<T, HarnessError> {
        match self.rx.recv().await {
            Some(item) => {
                self.probe.depth.current.fetch_sub(1, Ordering::SeqCst);
                Ok(item)
            }
            None => Err(HarnessError::ChannelClosed {
                channel: self.probe.name,
            }),
        }
    }

    pub fn probe(&self) -> MailboxProbe {
        self.probe.clone()
    }
}
