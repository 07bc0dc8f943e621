//! Dispatchers: strategies that turn operator state into vehicle plannings.
//!
//! | Mode     | Trigger                                   | Example            |
//! |----------|-------------------------------------------|--------------------|
//! | online   | each new request, via `assign_request`    | [`NearestVehicle`] |
//! | punctual | fixed times, via a [`DispatchLoop`]       | [`PalZhang`]       |
//!
//! Operators pick their dispatcher by key in a [`DispatcherRegistry`].

pub mod demand;
pub mod nearest;
pub mod pal_zhang;
pub mod registry;

use ms_core::{AgentId, OperatorId, RequestId, Tick};
use ms_sched::{Wait, Wake};
use ms_trace::LeaveOutcome;

use crate::{Process, SimError, SimResult, Step, World};

pub use demand::{load_demand_csv, load_demand_reader, DemandTable};
pub use nearest::NearestVehicle;
pub use pal_zhang::PalZhang;
pub use registry::{DispatcherEntry, DispatcherFactory, DispatcherRegistry};

/// A dispatch strategy bound to one operator.
///
/// Punctual dispatchers run [`dispatch`](Self::dispatch) in three phases so
/// the algorithm itself stays free of world updates until the end.
pub trait Dispatcher {
    fn name(&self) -> &'static str;

    /// Handle one new request immediately.
    fn online_dispatch(&mut self, _world: &mut World, _operator: OperatorId, request: RequestId) -> SimResult<()> {
        Err(SimError::config(format!("{} cannot dispatch request {request} online", self.name())))
    }

    /// First punctual dispatch time strictly after `after` (or the very
    /// first one).  `None` ends the dispatch loop.
    fn next_dispatch(&self, _after: Option<Tick>) -> Option<Tick> {
        None
    }

    /// Snapshot the operator state the algorithm works on.
    fn setup_dispatch(&mut self, _world: &mut World, _operator: OperatorId) -> SimResult<()> {
        Ok(())
    }

    fn run_algorithm(&mut self, _world: &mut World, _operator: OperatorId) -> SimResult<()> {
        Ok(())
    }

    /// Write the solution back into vehicle plannings.
    fn update_from_solution(&mut self, _world: &mut World, _operator: OperatorId) -> SimResult<()> {
        Ok(())
    }

    fn dispatch(&mut self, world: &mut World, operator: OperatorId) -> SimResult<()> {
        self.setup_dispatch(world, operator)?;
        self.run_algorithm(world, operator)?;
        self.update_from_solution(world, operator)
    }
}

// ── DispatchLoop ──────────────────────────────────────────────────────────────

/// Runs the punctual dispatcher of an operator at each of its times.
pub struct DispatchLoop {
    operator: OperatorId,
    last:     Option<Tick>,
}

impl DispatchLoop {
    pub fn new(operator: OperatorId) -> Self {
        Self { operator, last: None }
    }
}

impl Process for DispatchLoop {
    fn agent(&self) -> Option<AgentId> {
        None
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        let now = world.now();
        if wake == Wake::Timeout {
            let Some(mut dispatcher) = world.operator_mut(self.operator)?.punctual.take() else {
                return Ok(Step::Exit(LeaveOutcome::Success));
            };
            log::info!("{} runs {} at {now}", world.operator(self.operator)?, dispatcher.name());
            let result = dispatcher.dispatch(world, self.operator);
            world.operator_mut(self.operator)?.punctual = Some(dispatcher);
            result?;
            self.last = Some(now);
        }

        let next = world
            .operator(self.operator)?
            .punctual
            .as_ref()
            .and_then(|d| d.next_dispatch(self.last));
        match next {
            Some(at) => Ok(Step::Wait(Wait::timeout(at.since(now)))),
            None => Ok(Step::Exit(LeaveOutcome::Success)),
        }
    }
}
