//! Everything a process may read or mutate while it runs.

use ms_core::{AgentId, NodeId, OperatorId, ProcessId, RequestId, SimConfig, SimRng, StationId, Tick, VehicleId};
use ms_model::TripRequest;
use ms_sched::Scheduler;
use ms_spatial::{CostDimension, Topology};
use ms_trace::{EventKind, LeaveOutcome, RunSummary};

use crate::{AgentRegistry, Operator, Process, ServiceVehicle, SimError, SimResult, Station};

/// Simulation state shared by all processes.
///
/// Entities live in dense arenas indexed by their typed ids; every cross
/// reference (vehicle → operator, operator → fleet, rider → vehicle) is an
/// id, never a borrow.  Processes are owned here too but are taken out of
/// their slot while they run, so a process can freely borrow the rest of the
/// world.
pub struct World {
    pub config:    SimConfig,
    pub sched:     Scheduler,
    pub topology:  Box<dyn Topology>,
    pub rng:       SimRng,
    pub agents:    AgentRegistry,
    pub vehicles:  Vec<ServiceVehicle>,
    pub operators: Vec<Operator>,
    pub stations:  Vec<Station>,
    pub summary:   RunSummary,
    /// Indexed by `ProcessId`.  `None` while the process is resumed and
    /// after it finished.
    pub(crate) processes: Vec<Option<Box<dyn Process>>>,
}

impl World {
    pub fn new(config: SimConfig, topology: Box<dyn Topology>) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            sched:     Scheduler::new(config.end_tick()),
            rng:       SimRng::new(config.seed),
            config,
            topology,
            agents:    AgentRegistry::new(),
            vehicles:  Vec::new(),
            operators: Vec::new(),
            stations:  Vec::new(),
            summary:   RunSummary::default(),
            processes: Vec::new(),
        })
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.sched.now()
    }

    /// Register a process.  It starts at the current time, after everything
    /// already queued for this instant.
    pub fn spawn(&mut self, name: impl Into<String>, process: Box<dyn Process>) -> ProcessId {
        let pid = self.sched.register(name);
        debug_assert_eq!(pid.index(), self.processes.len());
        self.processes.push(Some(process));
        pid
    }

    // ── Arena access ──────────────────────────────────────────────────────

    pub fn vehicle(&self, id: VehicleId) -> SimResult<&ServiceVehicle> {
        self.vehicles.get(id.index()).ok_or(SimError::UnknownVehicle(id))
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> SimResult<&mut ServiceVehicle> {
        self.vehicles.get_mut(id.index()).ok_or(SimError::UnknownVehicle(id))
    }

    pub fn operator(&self, id: OperatorId) -> SimResult<&Operator> {
        self.operators.get(id.index()).ok_or(SimError::UnknownOperator(id))
    }

    pub fn operator_mut(&mut self, id: OperatorId) -> SimResult<&mut Operator> {
        self.operators.get_mut(id.index()).ok_or(SimError::UnknownOperator(id))
    }

    pub fn station(&self, id: StationId) -> SimResult<&Station> {
        self.stations.get(id.index()).ok_or(SimError::UnknownStation(id))
    }

    pub fn station_mut(&mut self, id: StationId) -> SimResult<&mut Station> {
        self.stations.get_mut(id.index()).ok_or(SimError::UnknownStation(id))
    }

    pub fn request(&self, operator: OperatorId, request: RequestId) -> SimResult<&TripRequest> {
        self.operator(operator)?
            .requests
            .get(&request)
            .ok_or(SimError::UnknownRequest { operator, request })
    }

    pub fn request_mut(&mut self, operator: OperatorId, request: RequestId) -> SimResult<&mut TripRequest> {
        self.operator_mut(operator)?
            .requests
            .get_mut(&request)
            .ok_or(SimError::UnknownRequest { operator, request })
    }

    // ── Traces ────────────────────────────────────────────────────────────

    /// Append `kind` to the trace of `agent`, stamped with the current time.
    pub fn trace(&mut self, agent: AgentId, kind: EventKind) -> SimResult<()> {
        let now = self.now();
        self.agents.get_mut(agent)?.trace.push(now, kind);
        Ok(())
    }

    /// Record the departure of `agent`.  Only the first call has an effect.
    pub fn leave(&mut self, agent: AgentId, outcome: LeaveOutcome) -> SimResult<bool> {
        let now = self.now();
        let record = self.agents.get_mut(agent)?;
        if record.left {
            return Ok(false);
        }
        record.left = true;
        record.trace.push(now, EventKind::LeaveSimulation { outcome });
        Ok(true)
    }

    // ── Topology ──────────────────────────────────────────────────────────

    /// Travel time between two positions, in whole seconds.
    pub fn travel_time(&mut self, from: NodeId, to: NodeId) -> SimResult<u64> {
        self.summary.shortest_path_calls += 1;
        let secs = self.topology.shortest_path_length(from, to, CostDimension::Time)?;
        Ok(secs.round() as u64)
    }

    /// Fastest path between two positions and its duration in seconds.
    pub fn route(&mut self, from: NodeId, to: NodeId) -> SimResult<(Vec<NodeId>, u64)> {
        self.summary.shortest_path_calls += 1;
        let path = self.topology.shortest_path(from, to, CostDimension::Time)?;
        let mut secs = 0.0;
        for pair in path.windows(2) {
            secs += self.topology.edge_data(pair[0], pair[1], CostDimension::Time)?;
        }
        Ok((path, secs.round() as u64))
    }
}
