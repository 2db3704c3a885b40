//! Device handle: the live signal surface of the device under test.
//!
//! The model sits behind a mutex shared by the driver's [`InputPort`], the
//! monitor's [`OutputPort`] and the clock task. The ports split access so
//! only the driver writes inputs and only the clock applies edges; the lock
//! is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::clock::{Clock, Edge, SAMPLE_SKEW};
use crate::config::ClockConfig;

/// Behavioral model of a clocked device.
pub trait Device: Send + 'static {
    /// Apply one rising clock edge.
    fn rising_edge(&mut self);

    /// Recompute combinational outputs after inputs changed.
    fn settle(&mut self) {}
}

#[derive(Debug)]
pub struct DeviceHandle<D> {
    dut: Arc<Mutex<D>>,
    clock: Clock,
}

impl<D> Clone for DeviceHandle<D> {
    fn clone(&self) -> Self {
        Self {
            dut: self.dut.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// Write access to device inputs, for the driver.
#[derive(Debug)]
pub struct InputPort<D> {
    handle: DeviceHandle<D>,
}

/// Read access to the device, for the monitor.
#[derive(Debug)]
pub struct OutputPort<D> {
    handle: DeviceHandle<D>,
}

impl<D: Device> DeviceHandle<D> {
    pub fn new(mut device: D, clock: ClockConfig) -> Self {
        device.settle();
        Self {
            dut: Arc::new(Mutex::new(device)),
            clock: Clock::new(clock),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn inputs(&self) -> InputPort<D> {
        InputPort {
            handle: self.clone(),
        }
    }

    pub fn outputs(&self) -> OutputPort<D> {
        OutputPort {
            handle: self.clone(),
        }
    }

    /// Read the device without going through a port.
    pub fn peek<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.lock())
    }

    /// Start the clock generator. Aborting the returned task stops time.
    pub fn spawn_clock(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move { handle.clock_loop().await })
    }

    async fn clock_loop(self) {
        let (half, to_sample) = self.clock.phase_delays();
        loop {
            sleep(half).await;
            self.clock.publish(Edge::Falling);

            sleep(to_sample).await;
            self.clock.publish(Edge::Sample);

            sleep(SAMPLE_SKEW).await;
            {
                let mut dut = self.lock();
                dut.rising_edge();
                dut.settle();
            }
            self.clock.publish(Edge::Rising);
        }
    }

    fn lock(&self) -> MutexGuard<'_, D> {
        self.dut.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Device> InputPort<D> {
    pub fn clock(&self) -> &Clock {
        &self.handle.clock
    }

    /// Change inputs; combinational outputs settle before the lock is released.
    pub fn drive<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut dut = self.handle.lock();
        let out = f(&mut dut);
        dut.settle();
        out
    }
}

impl<D: Device> OutputPort<D> {
    pub fn clock(&self) -> &Clock {
        &self.handle.clock
    }

    pub fn sample<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.handle.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Register with a combinational "next" output.
    #[derive(Debug, Default)]
    struct Reg {
        d: u8,
        q: u8,
        next: u8,
    }

    impl Device for Reg {
        fn rising_edge(&mut self) {
            self.q = self.d;
        }

        fn settle(&mut self) {
            self.next = self.d.wrapping_add(1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_settles_combinational_outputs() {
        let dut = DeviceHandle::new(Reg::default(), ClockConfig::default());
        dut.inputs().drive(|r| r.d = 4);

        assert_eq!(dut.outputs().sample(|r| r.next), 5);
        assert_eq!(dut.peek(|r| r.q), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_latches_on_rising_edge() {
        let dut = DeviceHandle::new(Reg::default(), ClockConfig::default());
        let clock_task = dut.spawn_clock();
        let inputs = dut.inputs();

        inputs.clock().falling().await.unwrap();
        inputs.drive(|r| r.d = 9);

        let outputs = dut.outputs();
        outputs.clock().sample_point().await.unwrap();
        assert_eq!(outputs.sample(|r| r.q), 0, "not latched before the edge");

        let tick = outputs.clock().rising().await.unwrap();
        assert_eq!(tick.cycle, 1);
        assert_eq!(outputs.sample(|r| r.q), 9);

        clock_task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_are_ordered_within_a_cycle() {
        let dut = DeviceHandle::new(Reg::default(), ClockConfig::default());
        let clock_task = dut.spawn_clock();
        let clock = dut.clock().clone();

        let start = tokio::time::Instant::now();
        clock.falling().await.unwrap();
        let falling = start.elapsed();
        clock.sample_point().await.unwrap();
        let sample = start.elapsed();
        clock.rising().await.unwrap();
        let rising = start.elapsed();

        assert!(falling < sample && sample < rising);
        assert_eq!(rising.as_millis(), 10);

        clock_task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_odd_period_keeps_its_length() {
        let config = ClockConfig {
            period_ms: 5,
            reset_cycles: 1,
        };
        let dut = DeviceHandle::new(Reg::default(), config);
        let clock_task = dut.spawn_clock();

        let start = tokio::time::Instant::now();
        let tick = dut.clock().rising_edges(8).await.unwrap();

        assert_eq!(tick.cycle, 8);
        assert_eq!(start.elapsed().as_millis(), 40);

        clock_task.abort();
    }
}
