//! Observer trait for progress reporting and data collection.

use ms_core::{AgentId, Tick};
use ms_trace::{LeaveOutcome, RunSummary};

/// Callbacks invoked by [`Sim::run`][crate::Sim::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: leave counter
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Leaves { failures: usize }
///
/// impl SimObserver for Leaves {
///     fn on_agent_left(&mut self, _time: Tick, _agent: AgentId, outcome: &LeaveOutcome) {
///         if !outcome.is_success() {
///             self.failures += 1;
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called once before the first resumption.
    fn on_sim_start(&mut self, _time: Tick) {}

    /// Called whenever the clock moves forward, before the first resumption
    /// at the new time.
    fn on_time_advance(&mut self, _time: Tick) {}

    /// Called each time an agent leaves the simulation, including agents
    /// still running at the time limit.
    fn on_agent_left(&mut self, _time: Tick, _agent: AgentId, _outcome: &LeaveOutcome) {}

    /// Called once after the run, with the filled summary.
    fn on_sim_end(&mut self, _summary: &RunSummary) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
