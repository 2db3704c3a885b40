//! Environment: owns the agents and sequences a run.
//!
//! Idle -> Reset -> Running -> Draining -> Terminated. `run()` goes through
//! all of them; the individual phase methods are public so a caller can add
//! work between phases.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::device::{Device, DeviceHandle};
use crate::diag::{Diagnostics, Tag};
use crate::driver::{run_driver, Driver};
use crate::error::HarnessError;
use crate::event::SyncEvent;
use crate::generator::Generator;
use crate::mailbox::{
    mailbox, MailboxProbe, MailboxRx, MailboxTx, GEN_TO_DRV, GEN_TO_SCO, MON_TO_SCO,
};
use crate::monitor::{run_monitor, Monitor};
use crate::report::{CounterSnapshot, RunCounters, RunReport, StopReason};
use crate::scoreboard::{Checker, Scoreboard};
use crate::stimulus::{RandomStimulus, StimulusSource};
use crate::stop::stop_pair;
use crate::transaction::Transaction;

/// Lifecycle phase of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Reset,
    Running,
    Draining,
    Terminated,
}

/// The four concurrently running agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agent {
    Generator,
    Driver,
    Monitor,
    Scoreboard,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::Generator => "generator",
            Agent::Driver => "driver",
            Agent::Monitor => "monitor",
            Agent::Scoreboard => "scoreboard",
        }
    }
}

type TerminateHook = Box<dyn FnOnce(&RunReport) + Send>;

/// Process-level stop, invoked once the run is over.
///
/// Idempotent: only the first `terminate` runs the hook; later calls return
/// `false`.
#[derive(Default)]
pub struct Termination {
    fired: AtomicBool,
    hook: Mutex<Option<TerminateHook>>,
}

impl Termination {
    pub fn set_hook(&self, hook: impl FnOnce(&RunReport) + Send + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn terminate(&self, report: &RunReport) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let hook = self
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook(report);
        }
        info!(bench = %report.bench, errors = report.errors, "terminated");
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

struct Agents<D, T, Drv, Mon, Chk> {
    generator: Generator<T>,
    driver: Drv,
    driver_inbox: MailboxRx<T>,
    monitor: Mon,
    monitor_outbox: MailboxTx<T>,
    scoreboard: Scoreboard<T, Chk>,
    _device: std::marker::PhantomData<fn() -> D>,
}

struct ChannelProbes {
    to_driver: MailboxProbe,
    reference: MailboxProbe,
    observed: MailboxProbe,
}

/// Owns a device and its four agents for one run.
pub struct Environment<D, T, Drv, Mon, Chk> {
    name: String,
    config: HarnessConfig,
    dut: DeviceHandle<D>,
    phase: Phase,
    agents: Option<Agents<D, T, Drv, Mon, Chk>>,
    done: Arc<SyncEvent>,
    diag: Diagnostics,
    counters: Arc<RunCounters>,
    probes: ChannelProbes,
    clock_task: Option<JoinHandle<()>>,
    first_finished: Option<(Agent, StopReason)>,
    termination: Arc<Termination>,
}

impl<D, T, Drv, Mon, Chk> Environment<D, T, Drv, Mon, Chk>
where
    D: Device,
    T: Transaction,
    Drv: Driver<D, T>,
    Mon: Monitor<D, T>,
    Chk: Checker<T>,
{
    /// Wire a device and its agents. Stimulus defaults to randomized
    /// transactions seeded from `config.seed`.
    pub fn new(
        name: impl Into<String>,
        config: HarnessConfig,
        device: D,
        driver: Drv,
        monitor: Mon,
        checker: Chk,
    ) -> Result<Self, HarnessError> {
        config.validate()?;

        let dut = DeviceHandle::new(device, config.clock.clone());
        let clock = dut.clock().clone();
        let diag = Diagnostics::new(config.record_diagnostics);
        let counters = Arc::new(RunCounters::default());
        let advance = Arc::new(SyncEvent::new("advance"));
        let done = Arc::new(SyncEvent::new("done"));

        let (to_driver, driver_inbox) = mailbox(GEN_TO_DRV);
        let (to_scoreboard, reference) = mailbox(GEN_TO_SCO);
        let (monitor_outbox, observed) = mailbox(MON_TO_SCO);
        let probes = ChannelProbes {
            to_driver: to_driver.probe(),
            reference: to_scoreboard.probe(),
            observed: monitor_outbox.probe(),
        };

        let generator = Generator {
            stimulus: Box::new(RandomStimulus::<T>::new(config.seed)),
            count: config.iterations,
            policy: config.on_randomize_failure,
            to_driver,
            to_scoreboard,
            advance: advance.clone(),
            done: done.clone(),
            clock: clock.clone(),
            diag: diag.clone(),
            counters: counters.clone(),
        };
        let scoreboard = Scoreboard {
            checker,
            observed,
            reference,
            advance,
            clock,
            diag: diag.clone(),
            counters: counters.clone(),
        };

        Ok(Self {
            name: name.into(),
            config,
            dut,
            phase: Phase::Idle,
            agents: Some(Agents {
                generator,
                driver,
                driver_inbox,
                monitor,
                monitor_outbox,
                scoreboard,
                _device: std::marker::PhantomData,
            }),
            done,
            diag,
            counters,
            probes,
            clock_task: None,
            first_finished: None,
            termination: Arc::new(Termination::default()),
        })
    }

    /// Replace the generator's stimulus. Only allowed before the run starts.
    pub fn set_stimulus(
        &mut self,
        stimulus: impl StimulusSource<T>,
    ) -> Result<(), HarnessError> {
        self.expect_phase(Phase::Idle)?;
        let agents = self.agents.as_mut().ok_or(HarnessError::AgentsConsumed)?;
        agents.generator.stimulus = Box::new(stimulus);
        Ok(())
    }

    /// Register the action to take when the run terminates.
    pub fn on_terminate(&self, hook: impl FnOnce(&RunReport) + Send + 'static) {
        self.termination.set_hook(hook);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn device(&self) -> &DeviceHandle<D> {
        &self.dut
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn counts(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn termination(&self) -> &Arc<Termination> {
        &self.termination
    }

    pub fn done_event(&self) -> &SyncEvent {
        &self.done
    }

    /// Reset, run and drain.
    pub async fn run(&mut self) -> Result<RunReport, HarnessError> {
        self.pre_test().await?;
        self.test().await?;
        self.post_test().await
    }

    /// Idle -> Reset: start the clock and run the driver's reset sequence.
    pub async fn pre_test(&mut self) -> Result<(), HarnessError> {
        self.transition(Phase::Idle, Phase::Reset)?;
        if self.clock_task.is_none() {
            self.clock_task = Some(self.dut.spawn_clock());
        }

        let cycles = self.config.clock.reset_cycles;
        let port = self.dut.inputs();
        let agents = self.agents.as_mut().ok_or(HarnessError::AgentsConsumed)?;
        agents.driver.reset(&port, cycles).await?;

        let cycle = self.dut.clock().cycle();
        self.diag
            .emit(Tag::Rst, cycle, format!("[RST] reset:done held_cycles:{cycles}"));
        info!(bench = %self.name, cycle, "reset complete");
        Ok(())
    }

    /// Reset -> Running: run the four agents until the first one finishes,
    /// then stop the rest.
    pub async fn test(&mut self) -> Result<(), HarnessError> {
        self.transition(Phase::Reset, Phase::Running)?;
        let Agents {
            generator,
            driver,
            driver_inbox,
            monitor,
            monitor_outbox,
            scoreboard,
            ..
        } = self.agents.take().ok_or(HarnessError::AgentsConsumed)?;
        let (stop_handle, stop) = stop_pair();

        let mut tasks = JoinSet::new();
        {
            let stop = stop.clone();
            tasks.spawn(async move { (Agent::Generator, generator.run(stop).await) });
        }
        {
            let fut = run_driver(
                driver,
                self.dut.inputs(),
                driver_inbox,
                self.diag.clone(),
                self.counters.clone(),
                stop.clone(),
            );
            tasks.spawn(async move { (Agent::Driver, fut.await) });
        }
        {
            let fut = run_monitor(
                monitor,
                self.dut.outputs(),
                monitor_outbox,
                self.diag.clone(),
                self.counters.clone(),
                stop.clone(),
            );
            tasks.spawn(async move { (Agent::Monitor, fut.await) });
        }
        tasks.spawn(async move { (Agent::Scoreboard, scoreboard.run(stop).await) });

        let first = tasks.join_next().await;
        stop_handle.stop();

        match first {
            Some(Ok((agent, result))) => {
                info!(bench = %self.name, agent = agent.as_str(), "first agent finished");
                self.first_finished = Some((agent, stop_reason(agent, result)));
            }
            Some(Err(join_err)) => {
                tasks.shutdown().await;
                return Err(join_err.into());
            }
            None => {}
        }

        // Stopped agents return at their next suspension point.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((agent, Err(err))) => {
                    warn!(agent = agent.as_str(), error = %err, "agent failed while stopping");
                }
                Ok(_) => {}
                Err(join_err) => return Err(join_err.into()),
            }
        }
        Ok(())
    }

    /// Running -> Draining -> Terminated: wait for `done`, build the report
    /// and terminate exactly once.
    pub async fn post_test(&mut self) -> Result<RunReport, HarnessError> {
        self.transition(Phase::Running, Phase::Draining)?;

        if matches!(self.first_finished, Some((Agent::Generator, _))) {
            self.done.wait_triggered().await;
        } else {
            warn!(bench = %self.name, "generator did not finish; not waiting for done");
        }

        if let Some(clock_task) = self.clock_task.take() {
            clock_task.abort();
        }

        let report = self.report();
        self.transition(Phase::Draining, Phase::Terminated)?;
        self.termination.terminate(&report);
        Ok(report)
    }

    /// Report of the run so far.
    pub fn report(&self) -> RunReport {
        let stop_reason = match &self.first_finished {
            Some((_, reason)) => reason.clone(),
            None => StopReason::Completed,
        };
        let diagnostics: BTreeMap<String, u64> = self
            .diag
            .counts()
            .into_iter()
            .map(|(tag, count)| (tag.as_str().to_string(), count))
            .collect();

        RunReport {
            bench: self.name.clone(),
            iterations: self.config.iterations,
            seed: self.config.seed,
            counts: self.counters.snapshot(),
            errors: self.counters.errors(),
            final_cycle: self.dut.clock().cycle(),
            max_in_flight: self.probes.to_driver.high_water(),
            stop_reason,
            diagnostics,
        }
    }

    /// Occupancy probes for the gen->drv, gen->sco and mon->sco mailboxes.
    pub fn mailbox_probes(&self) -> [&MailboxProbe; 3] {
        [
            &self.probes.to_driver,
            &self.probes.reference,
            &self.probes.observed,
        ]
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), HarnessError> {
        if self.phase != expected {
            return Err(HarnessError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn transition(&mut self, from: Phase, to: Phase) -> Result<(), HarnessError> {
        self.expect_phase(from)?;
        info!(bench = %self.name, from = ?from, to = ?to, "phase transition");
        self.phase = to;
        Ok(())
    }
}

impl<D, T, Drv, Mon, Chk> Drop for Environment<D, T, Drv, Mon, Chk> {
    fn drop(&mut self) {
        if let Some(clock_task) = self.clock_task.take() {
            clock_task.abort();
        }
    }
}

/// Why Running ended, given the agent that finished first and its result.
fn stop_reason(agent: Agent, result: Result<(), HarnessError>) -> StopReason {
    match (agent, result) {
        (Agent::Generator, Ok(())) => StopReason::Completed,
        (Agent::Generator, Err(HarnessError::Randomize(err))) => StopReason::RandomizeFailed {
            reason: err.to_string(),
        },
        (agent, Ok(())) => StopReason::AgentFailed {
            agent: agent.as_str().to_string(),
            error: "returned early".to_string(),
        },
        (agent, Err(err)) => StopReason::AgentFailed {
            agent: agent.as_str().to_string(),
            error: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::RandomizeError;

    #[test]
    fn test_generator_randomize_error_is_randomize_failure() {
        let err = RandomizeError::Exhausted { produced: 2 };
        assert_eq!(
            stop_reason(Agent::Generator, Err(err.clone().into())),
            StopReason::RandomizeFailed {
                reason: err.to_string()
            }
        );
    }

    #[test]
    fn test_generator_channel_error_is_agent_failure() {
        let reason = stop_reason(
            Agent::Generator,
            Err(HarnessError::ChannelClosed {
                channel: crate::mailbox::GEN_TO_DRV,
            }),
        );
        assert_eq!(
            reason,
            StopReason::AgentFailed {
                agent: "generator".to_string(),
                error: "channel 'gen->drv' closed".to_string(),
            }
        );
    }

    #[test]
    fn test_other_agent_finishing_first_is_agent_failure() {
        assert_eq!(stop_reason(Agent::Generator, Ok(())), StopReason::Completed);
        assert!(matches!(
            stop_reason(Agent::Monitor, Ok(())),
            StopReason::AgentFailed { agent, .. } if agent == "monitor"
        ));
        assert!(matches!(
            stop_reason(Agent::Scoreboard, Err(HarnessError::ClockStopped)),
            StopReason::AgentFailed { .. }
        ));
    }
}
