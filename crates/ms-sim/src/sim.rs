//! The `Sim` struct and its run loop.

use std::time::Instant;

use ms_core::{AgentId, ProcessId, Tick};
use ms_sched::Wake;
use ms_trace::{LeaveOutcome, RunSummary};

use crate::{SimError, SimObserver, SimResult, Step, World};

/// The simulation runner.
///
/// Repeatedly pops the next resumption from the scheduler and resumes the
/// matching process until nothing is left before the time limit:
///
/// 1. **Take**: the process leaves its slot so it can borrow the world.
/// 2. **Resume**: it runs until it asks for a wait or exits.
/// 3. **Apply**: a wait suspends it and puts it back; an exit finishes it
///    and records its agent's departure.
///
/// A [`SimError::Logic`] ends the failing process only; its agent leaves
/// with [`LeaveOutcome::Error`].  Every other error aborts the run.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub world: World,
}

impl Sim {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run the simulation to its time limit and return the summary.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<&RunSummary> {
        let started = Instant::now();
        let mut last = self.world.now();
        observer.on_sim_start(last);

        while let Some((pid, wake)) = self.world.sched.next() {
            let now = self.world.now();
            if now != last {
                observer.on_time_advance(now);
                last = now;
            }
            self.resume(pid, wake, observer)?;
        }

        self.close(observer)?;
        let summary = &mut self.world.summary;
        summary.resumptions = self.world.sched.resumptions();
        summary.end_time = self.world.sched.now();
        summary.wall_time = started.elapsed();
        log::info!(
            "run ended at {} after {} resumptions ({} requests, {} fulfilled)",
            summary.end_time, summary.resumptions, summary.requests_created, summary.requests_fulfilled,
        );
        observer.on_sim_end(summary);
        Ok(&self.world.summary)
    }

    /// Trace of one agent, by name.
    pub fn trace_of(&self, name: &str) -> Option<&ms_trace::Trace> {
        let id = self.world.agents.find(name)?;
        self.world.agents.get(id).ok().map(|r| &r.trace)
    }

    // ── Core ──────────────────────────────────────────────────────────────

    fn resume<O: SimObserver>(&mut self, pid: ProcessId, wake: Wake, observer: &mut O) -> SimResult<()> {
        let Some(mut process) = self.world.processes.get_mut(pid.index()).and_then(Option::take) else {
            log::warn!("resumption of unknown process {pid} ignored");
            return Ok(());
        };
        let agent = process.agent();

        match process.resume(&mut self.world, wake) {
            Ok(Step::Wait(wait)) => {
                self.world.processes[pid.index()] = Some(process);
                self.world.sched.suspend(pid, wait)?;
            }
            Ok(Step::Exit(outcome)) => {
                self.world.sched.finish(pid);
                self.depart(agent, outcome, observer)?;
            }
            Err(SimError::Logic(message)) => {
                let name = self.world.sched.process_name(pid).unwrap_or("?").to_owned();
                log::error!("{name} stopped on a simulation error: {message}");
                self.world.summary.agent_errors += 1;
                self.world.sched.finish(pid);
                self.depart(agent, LeaveOutcome::Error(message), observer)?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn depart<O: SimObserver>(&mut self, agent: Option<AgentId>, outcome: LeaveOutcome, observer: &mut O) -> SimResult<()> {
        let Some(agent) = agent else {
            return Ok(());
        };
        if self.world.leave(agent, outcome.clone())? {
            observer.on_agent_left(self.world.now(), agent, &outcome);
        }
        Ok(())
    }

    /// Move the clock to the limit and make every agent still running leave.
    fn close<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        self.world.sched.close();
        let running: Vec<(ProcessId, Option<AgentId>)> = self
            .world
            .processes
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (ProcessId(i as u32), p.agent())))
            .filter(|&(pid, _)| self.world.sched.is_alive(pid))
            .collect();
        for (pid, agent) in running {
            self.world.sched.finish(pid);
            self.depart(agent, LeaveOutcome::EndOfSimulation, observer)?;
        }
        Ok(())
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.world.now()
    }
}
