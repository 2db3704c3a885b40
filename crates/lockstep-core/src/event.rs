//! Payload-free sync events.
//!
//! `fire` wakes the tasks currently waiting and is otherwise forgotten: an
//! event fired with no waiter does not satisfy a later `wait`. A task that
//! must not miss a fire it is about to provoke arms itself first with
//! [`SyncEvent::arm`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

#[derive(Debug)]
pub struct SyncEvent {
    name: &'static str,
    notify: Notify,
    fired: AtomicU64,
}

/// A registered wait, created before the work that leads to the fire.
pub struct Armed<'a> {
    notified: Pin<Box<Notified<'a>>>,
}

impl SyncEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            notify: Notify::new(),
            fired: AtomicU64::new(0),
        }
    }

    /// Wake every current waiter. Not latched.
    pub fn fire(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        tracing::trace!(event = self.name, "fired");
    }

    /// Wait for the next fire.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Register for the next fire now; await the returned value later.
    pub fn arm(&self) -> Armed<'_> {
        let mut notified = Box::pin(self.notify.notified());
        notified.as_mut().enable();
        Armed { notified }
    }

    /// Return once the event has fired at least once, now or earlier.
    pub async fn wait_triggered(&self) {
        loop {
            let armed = self.arm();
            if self.fire_count() > 0 {
                return;
            }
            armed.await;
        }
    }

    /// How many times the event has fired.
    pub fn fire_count(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Future for Armed<'_> {
    type Output = ();

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        self.notified.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for Armed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Armed").finish_non_exhaustive()
    }
}
