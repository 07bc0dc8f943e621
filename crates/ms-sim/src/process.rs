//! The agent process contract.

use ms_core::AgentId;
use ms_sched::{Wait, Wake};
use ms_trace::LeaveOutcome;

use crate::{SimResult, World};

/// What a process asks for after one resumption.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Suspend until the wait resolves.
    Wait(Wait),
    /// Leave the simulation.
    Exit(LeaveOutcome),
}

/// A cooperative agent loop written as an explicit state machine.
///
/// The run loop calls [`resume`](Self::resume) with the reason the process
/// woke up.  The process mutates the world, then either returns the next
/// [`Wait`] or exits with a [`LeaveOutcome`].
///
/// Returning [`SimError::Logic`](crate::SimError::Logic) ends only this
/// process: its agent leaves with an error cause and the run continues.  Any
/// other error aborts the run.
pub trait Process {
    /// Traced agent behind this process, if any.  Helper processes such as
    /// deadlines and dispatch loops have none.
    fn agent(&self) -> Option<AgentId>;

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step>;
}
