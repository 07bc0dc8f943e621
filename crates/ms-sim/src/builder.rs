//! Builder assembling a [`World`] and its processes into a [`Sim`].

use std::rc::Rc;

use ms_core::{AgentId, NodeId, OperatorId, SimConfig, StationId, StopPointId, Tick, TransportMode, TripId, VehicleId, Zone};
use ms_model::StopPoint;
use ms_sched::Store;
use ms_spatial::Topology;

use crate::agents::population;
use crate::dispatch::{DemandTable, DispatchLoop, DispatcherRegistry};
use crate::operator::{OperationParameters, TripQuery};
use crate::rider::{StationRider, TripRider};
use crate::vehicle::{
    Body, Cabin, DefaultStops, FleetRunner, Itinerary, RepositioningStops, RouteKey, StopPolicy, TimetableRunner,
    TimetabledStops, VehicleKind, DEFAULT_DWELL_TIME,
};
use crate::{Operator, Process, ServiceVehicle, SimError, SimResult, Sim, Station, World};

/// Description of one service vehicle.
///
/// | Field        | Default                                   |
/// |--------------|-------------------------------------------|
/// | `mode`       | `TransportMode::Car`                      |
/// | `dwell_time` | [`DEFAULT_DWELL_TIME`]                    |
/// | `policy`     | chosen from `kind` (see [`add_vehicle`])  |
///
/// [`add_vehicle`]: SimBuilder::add_vehicle
#[derive(Clone)]
pub struct VehicleSpec {
    pub name:       String,
    pub operator:   OperatorId,
    pub kind:       VehicleKind,
    pub position:   NodeId,
    pub seats:      u32,
    pub mode:       TransportMode,
    pub dwell_time: u64,
    pub policy:     Option<Rc<dyn StopPolicy>>,
}

impl VehicleSpec {
    pub fn new(name: impl Into<String>, operator: OperatorId, kind: VehicleKind, position: NodeId, seats: u32) -> Self {
        Self {
            name: name.into(),
            operator,
            kind,
            position,
            seats,
            mode:       TransportMode::Car,
            dwell_time: DEFAULT_DWELL_TIME,
            policy:     None,
        }
    }

    pub fn dwell_time(mut self, secs: u64) -> Self {
        self.dwell_time = secs;
        self
    }

    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn policy(mut self, policy: Rc<dyn StopPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Builder for [`Sim`].
///
/// Entities are added one by one and get their ids back; every agent
/// process is registered as soon as its agent is added, so processes start
/// in insertion order.  Dispatchers are instantiated from the registry in
/// [`build`](Self::build), which also registers the punctual dispatch loops.
///
/// # Example
///
/// ```rust,ignore
/// let mut b = SimBuilder::new(SimConfig::new(86_400, 42), Box::new(network))?;
/// let op = b.add_operator("taxi", TransportMode::Car, params.with_dispatcher("nearest_vehicle"))?;
/// b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, NodeId(0), 4))?;
/// b.add_trip_rider("alice", op, TripQuery::new(NodeId(3), NodeId(9)), Tick(600), Some(900))?;
/// let mut sim = b.build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    world:    World,
    registry: DispatcherRegistry,
}

impl SimBuilder {
    pub fn new(config: SimConfig, topology: Box<dyn Topology>) -> SimResult<Self> {
        Ok(Self { world: World::new(config, topology)?, registry: DispatcherRegistry::builtin() })
    }

    /// Replace the dispatcher registry.
    pub fn registry(mut self, registry: DispatcherRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Direct access to the world under construction.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn spawn(&mut self, name: &str, process: impl Process + 'static) -> ms_core::ProcessId {
        self.world.spawn(name, Box::new(process))
    }

    // ── Operators ─────────────────────────────────────────────────────────

    pub fn add_operator(&mut self, name: &str, mode: TransportMode, params: OperationParameters) -> SimResult<OperatorId> {
        let id = OperatorId(self.world.operators.len() as u32);
        let agent = self.world.agents.add(name, population::OPERATORS, NodeId::INVALID)?;
        let operator = Operator::new(id, agent, name, mode, params)?;
        self.world.operators.push(operator);
        Ok(id)
    }

    pub fn set_zone(&mut self, operator: OperatorId, zone: Zone) -> SimResult<()> {
        self.world.operator_mut(operator)?.zone = Some(zone);
        Ok(())
    }

    pub fn set_demand(&mut self, operator: OperatorId, demand: DemandTable) -> SimResult<()> {
        self.world.operator_mut(operator)?.demand = demand;
        Ok(())
    }

    pub fn add_stop_point(&mut self, operator: OperatorId, id: &str, name: &str, position: NodeId) -> SimResult<StopPointId> {
        let id = StopPointId::new(id);
        self.world.operator_mut(operator)?.add_stop_point(StopPoint::new(id.clone(), name, position))?;
        Ok(id)
    }

    pub fn add_depot(&mut self, operator: OperatorId, position: NodeId) -> SimResult<StopPointId> {
        self.world.operator_mut(operator)?.add_depot_point(position)
    }

    /// Register a timetabled trip of `operator`.  See
    /// [`Operator::add_timetabled_trip`].
    pub fn add_timetabled_trip(
        &mut self,
        operator: OperatorId,
        trip:     &str,
        route:    RouteKey,
        visits:   &[(StopPointId, Tick, Tick)],
    ) -> SimResult<TripId> {
        self.world.operator_mut(operator)?.add_timetabled_trip(TripId::new(trip), route, visits)
    }

    /// Give a timetabled vehicle the trips it runs, in order.
    pub fn assign_trips(&mut self, vehicle: VehicleId, trips: &[TripId]) -> SimResult<()> {
        let operator = self.world.vehicle(vehicle)?.operator;
        let op = self.world.operator_mut(operator)?;
        for trip in trips {
            op.bind_trip(trip, vehicle)?;
        }
        self.world.vehicle_mut(vehicle)?.itinerary.trip_list.extend_from_slice(trips);
        Ok(())
    }

    // ── Stations ──────────────────────────────────────────────────────────

    /// Add a station holding `stock` fresh units out of `capacity` docks.
    pub fn add_station(
        &mut self,
        name:     &str,
        position: NodeId,
        capacity: usize,
        stock:    usize,
        operator: Option<OperatorId>,
    ) -> SimResult<StationId> {
        if stock > capacity {
            return Err(SimError::config(format!("station {name} cannot hold {stock} units in {capacity} docks")));
        }
        let id = StationId(self.world.stations.len() as u32);
        let agent = self.world.agents.add(name, population::STATIONS, position)?;
        let mut units = Vec::with_capacity(stock);
        for i in 0..stock {
            units.push(self.world.agents.add(format!("{name}-unit-{i}"), population::UNITS, position)?);
        }
        let store = Store::with_items(capacity, units)?;
        if let Some(op) = operator {
            self.world.operator_mut(op)?.stations.push(id);
        }
        self.world.stations.push(Station { id, agent, name: name.to_owned(), position, operator, store });
        Ok(id)
    }

    // ── Vehicles ──────────────────────────────────────────────────────────

    /// Add a service vehicle and register its process.
    ///
    /// Without an explicit policy, on-demand vehicles serve with
    /// [`DefaultStops`], staff with [`RepositioningStops`] and timetabled
    /// vehicles with [`TimetabledStops`].  Staff vehicles join the operator
    /// staff, the others its fleet.
    pub fn add_vehicle(&mut self, spec: VehicleSpec) -> SimResult<VehicleId> {
        let id = VehicleId(self.world.vehicles.len() as u32);
        let population = match spec.kind {
            VehicleKind::Staff => population::STAFF,
            _ => population::VEHICLES,
        };
        let agent = self.world.agents.add(spec.name.as_str(), population, spec.position)?;
        let policy: Rc<dyn StopPolicy> = match (spec.policy, spec.kind) {
            (Some(policy), _)               => policy,
            (None, VehicleKind::OnDemand)   => Rc::new(DefaultStops),
            (None, VehicleKind::Staff)      => Rc::new(RepositioningStops),
            (None, VehicleKind::Timetabled) => Rc::new(TimetabledStops),
        };

        let op = self.world.operator_mut(spec.operator)?;
        match spec.kind {
            VehicleKind::Staff => op.staff.push(id),
            _ => op.fleet.push(id),
        }

        let signal = self.world.sched.new_event();
        self.world.vehicles.push(ServiceVehicle {
            id,
            name:      spec.name.clone(),
            kind:      spec.kind,
            operator:  spec.operator,
            body:      Body { agent, position: spec.position, mode: spec.mode },
            cabin:     Cabin::new(spec.seats),
            itinerary: Itinerary {
                planning:         Vec::new(),
                trip:             None,
                trip_list:        Vec::new(),
                route:            None,
                temp_destination: None,
                dwell_time:       spec.dwell_time,
                is_idle:          false,
                holding:          false,
                signal,
            },
            policy,
            process:   ms_core::ProcessId::INVALID,
        });

        let process = match spec.kind {
            VehicleKind::Timetabled => self.spawn(&spec.name, TimetableRunner::new(id, agent)),
            _ => self.spawn(&spec.name, FleetRunner::new(id, agent)),
        };
        self.world.vehicle_mut(id)?.process = process;
        Ok(id)
    }

    // ── Riders ────────────────────────────────────────────────────────────

    pub fn add_trip_rider(
        &mut self,
        name:     &str,
        operator: OperatorId,
        query:    TripQuery,
        depart:   Tick,
        patience: Option<u64>,
    ) -> SimResult<AgentId> {
        self.world.operator(operator)?;
        let agent = self.world.agents.add(name, population::RIDERS, query.origin)?;
        self.spawn(name, TripRider::new(agent, operator, query, depart, patience));
        Ok(agent)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_station_rider(
        &mut self,
        name:        &str,
        origin:      NodeId,
        destination: NodeId,
        from:        StationId,
        to:          StationId,
        depart:      Tick,
        patience:    Option<u64>,
    ) -> SimResult<AgentId> {
        self.world.station(from)?;
        self.world.station(to)?;
        let agent = self.world.agents.add(name, population::RIDERS, origin)?;
        self.spawn(name, StationRider::new(agent, origin, destination, from, to, depart, patience));
        Ok(agent)
    }

    // ── Build ─────────────────────────────────────────────────────────────

    /// Instantiate the operators' dispatchers and return a ready-to-run
    /// [`Sim`].
    pub fn build(mut self) -> SimResult<Sim> {
        for index in 0..self.world.operators.len() {
            let id = OperatorId(index as u32);
            let (online, punctual) = self.registry.instantiate(&self.world.operator(id)?.params)?;
            let has_loop = punctual.is_some();
            let op = self.world.operator_mut(id)?;
            op.online = online;
            op.punctual = punctual;
            if has_loop {
                let name = format!("dispatch-{}", op.name);
                self.spawn(&name, DispatchLoop::new(id));
            }
        }
        log::info!(
            "built simulation with {} agents, {} vehicles, {} operators and {} stations",
            self.world.agents.len(),
            self.world.vehicles.len(),
            self.world.operators.len(),
            self.world.stations.len(),
        );
        Ok(Sim::new(self.world))
    }
}
