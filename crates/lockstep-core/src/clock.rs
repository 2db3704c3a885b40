//! Logical clock.
//!
//! Simulated time is Tokio's paused clock: it only moves when every task is
//! suspended, so everything an edge wakes runs to completion before the next
//! edge. One cycle publishes three phases at distinct instants:
//!
//! - `Falling`: drivers apply inputs.
//! - `Sample`: just before the rising edge; monitors read settled values.
//! - `Rising`: sequential devices latch; the cycle counter increments.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::config::ClockConfig;
use crate::error::HarnessError;

/// Distance between the sample point and the rising edge.
pub const SAMPLE_SKEW: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Edge {
    Falling,
    Sample,
    Rising,
}

/// Current position on the simulated time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tick {
    /// Rising edges seen so far.
    pub cycle: u64,
    pub edge: Edge,
}

#[derive(Debug, Clone)]
pub struct Clock {
    tx: Arc<watch::Sender<Tick>>,
    config: ClockConfig,
}

impl Clock {
    pub fn new(config: ClockConfig) -> Self {
        let (tx, _rx) = watch::channel(Tick {
            cycle: 0,
            edge: Edge::Rising,
        });
        Self {
            tx: Arc::new(tx),
            config,
        }
    }

    pub fn now(&self) -> Tick {
        *self.tx.borrow()
    }

    pub fn cycle(&self) -> u64 {
        self.now().cycle
    }

    /// Wait for the next occurrence of `edge`.
    pub async fn wait(&self, edge: Edge) -> Result<Tick, HarnessError> {
        let mut rx = self.tx.subscribe();
        loop {
            rx.changed()
                .await
                .map_err(|_| HarnessError::ClockStopped)?;
            let tick = *rx.borrow_and_update();
            if tick.edge == edge {
                return Ok(tick);
            }
        }
    }

    pub async fn rising(&self) -> Result<Tick, HarnessError> {
        self.wait(Edge::Rising).await
    }

    pub async fn falling(&self) -> Result<Tick, HarnessError> {
        self.wait(Edge::Falling).await
    }

    pub async fn sample_point(&self) -> Result<Tick, HarnessError> {
        self.wait(Edge::Sample).await
    }

    pub async fn rising_edges(&self, count: u64) -> Result<Tick, HarnessError> {
        let mut tick = self.now();
        for _ in 0..count {
            tick = self.rising().await?;
        }
        Ok(tick)
    }

    pub async fn sample_points(&self, count: u64) -> Result<Tick, HarnessError> {
        let mut tick = self.now();
        for _ in 0..count {
            tick = self.sample_point().await?;
        }
        Ok(tick)
    }

    /// Delays from rising edge to falling edge and from falling edge to
    /// sample point. Together with `SAMPLE_SKEW` they add up to the period,
    /// odd periods included.
    pub(crate) fn phase_delays(&self) -> (Duration, Duration) {
        let period = Duration::from_millis(self.config.period_ms);
        let half = period / 2;
        (half, period.saturating_sub(half).saturating_sub(SAMPLE_SKEW))
    }

    pub(crate) fn publish(&self, edge: Edge) {
        self.tx.send_modify(|tick| {
            if edge == Edge::Rising {
                tick.cycle += 1;
            }
            tick.edge = edge;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rising_edge_counts_cycles() {
        let clock = Clock::new(ClockConfig::default());
        let waiter = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.rising_edges(2).await })
        };
        tokio::task::yield_now().await;

        for edge in [Edge::Falling, Edge::Sample, Edge::Rising] {
            clock.publish(edge);
            tokio::task::yield_now().await;
        }
        for edge in [Edge::Falling, Edge::Sample, Edge::Rising] {
            clock.publish(edge);
            tokio::task::yield_now().await;
        }

        let tick = waiter.await.unwrap().unwrap();
        assert_eq!(tick.cycle, 2);
        assert_eq!(clock.cycle(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ignores_other_edges() {
        let clock = Clock::new(ClockConfig::default());
        let waiter = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sample_point().await })
        };
        tokio::task::yield_now().await;

        clock.publish(Edge::Falling);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        clock.publish(Edge::Sample);
        let tick = waiter.await.unwrap().unwrap();
        assert_eq!(tick.edge, Edge::Sample);
        assert_eq!(tick.cycle, 0);
    }

    #[test]
    fn test_phase_delays_leave_room_for_sample_point() {
        let clock = Clock::new(ClockConfig {
            period_ms: 10,
            reset_cycles: 1,
        });
        let (half, to_sample) = clock.phase_delays();
        assert_eq!(half, Duration::from_millis(5));
        assert_eq!(to_sample, Duration::from_millis(4));
    }

    #[test]
    fn test_odd_period_delays_fill_the_cycle() {
        let clock = Clock::new(ClockConfig {
            period_ms: 5,
            reset_cycles: 1,
        });
        let (half, to_sample) = clock.phase_delays();
        assert_eq!(half, Duration::from_millis(2));
        assert_eq!(to_sample, Duration::from_millis(2));
        assert_eq!(half + to_sample + SAMPLE_SKEW, Duration::from_millis(5));
    }
}
