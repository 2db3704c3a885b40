//! Cooperative cancellation for agent tasks.
//!
//! The environment raises the stop flag once the first agent finishes.
//! Every agent wraps each suspension point in [`StopSignal::guard`], so a
//! stopped agent returns at its next await instead of being torn down
//! mid-update.

use std::future::Future;

use tokio::sync::watch;

#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once stop is raised or the handle is dropped.
    pub async fn stopped(&mut self) {
        let _raised = self.rx.wait_for(|stopped| *stopped).await.is_ok();
    }

    /// Run `fut` unless stop is raised first. `None` means stopped.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.stopped() => None,
            out = fut => Some(out),
        }
    }
}
