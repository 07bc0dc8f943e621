//! Operators: fleet, stop point registry and request ledger.
//!
//! The operator is the mediator between riders and vehicles.  Riders hand
//! it trip requests, its dispatchers write vehicle plannings, and vehicles
//! call back into its ledger while they pick up and drop off.  Operations
//! that need the scheduler or the topology live on [`World`](crate::World)
//! in [`requests`].

pub mod formula;
pub mod params;
pub mod requests;

use std::collections::{BTreeMap, HashMap};

use ms_core::{AgentId, NodeId, OperatorId, RequestId, StationId, StopPointId, Tick, TransportMode, TripId, VehicleId, Zone};
use ms_model::{Planning, Stop, StopPoint, TripRequest};
use ms_sched::Scheduler;
use ms_spatial::Topology;

use crate::dispatch::{DemandTable, Dispatcher};
use crate::vehicle::RouteKey;
use crate::{SimError, SimResult};

pub use formula::Formula;
pub use params::{Detour, IdleBehaviour, NeighborStrategy, OperationParameters, PalZhangParams, PriorityThreshold, Threshold};
pub use requests::{PickupDeadline, TripQuery};

/// Planning of one trip and the vehicle bound to run it.
#[derive(Clone, Debug, Default)]
pub struct TripSlot {
    /// Set once.
    pub vehicle:  Option<VehicleId>,
    pub planning: Planning,
}

pub struct Operator {
    pub id:           OperatorId,
    pub agent:        AgentId,
    pub name:         String,
    pub mode:         TransportMode,
    pub fleet:        Vec<VehicleId>,
    pub staff:        Vec<VehicleId>,
    pub stations:     Vec<StationId>,
    pub stop_points:  BTreeMap<StopPointId, StopPoint>,
    pub depot_points: BTreeMap<StopPointId, StopPoint>,
    pub trips:        BTreeMap<TripId, TripSlot>,
    pub routes:       HashMap<TripId, RouteKey>,
    pub requests:     BTreeMap<RequestId, TripRequest>,
    pub fulfilled:    Vec<RequestId>,
    /// Requests no dispatcher could assign.
    pub left_out:     Vec<RequestId>,
    pub params:       OperationParameters,
    /// Service area.  `None` serves everywhere.
    pub zone:         Option<Zone>,
    pub demand:       DemandTable,
    pub(crate) online:   Option<Box<dyn Dispatcher>>,
    pub(crate) punctual: Option<Box<dyn Dispatcher>>,
    formula:          Option<Formula>,
    request_count:    u32,
    trip_count:       u32,
}

impl Operator {
    /// Build an operator.  Fails on invalid parameters, including a
    /// malformed travel time formula.
    pub fn new(
        id:     OperatorId,
        agent:  AgentId,
        name:   impl Into<String>,
        mode:   TransportMode,
        params: OperationParameters,
    ) -> SimResult<Self> {
        params.validate()?;
        let formula = params.formula()?;
        Ok(Self {
            id,
            agent,
            name:          name.into(),
            mode,
            fleet:         Vec::new(),
            staff:         Vec::new(),
            stations:      Vec::new(),
            stop_points:   BTreeMap::new(),
            depot_points:  BTreeMap::new(),
            trips:         BTreeMap::new(),
            routes:        HashMap::new(),
            requests:      BTreeMap::new(),
            fulfilled:     Vec::new(),
            left_out:      Vec::new(),
            params,
            zone:          None,
            demand:        DemandTable::default(),
            online:        None,
            punctual:      None,
            formula,
            request_count: 0,
            trip_count:    0,
        })
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Register a fresh trip request of `agent` and return its id.
    pub fn new_request(&mut self, sched: &mut Scheduler, agent: AgentId, seats: u32) -> RequestId {
        let id = RequestId(self.request_count);
        self.request_count += 1;
        self.requests.insert(id, TripRequest::new(sched, id, agent, self.id, seats));
        id
    }

    /// Maximum acceptable travel time for a trip whose direct travel time
    /// is `direct`.
    ///
    /// The operator formula wins; otherwise the `max_detour` parameter is
    /// applied.  `None` means unconstrained.
    pub fn compute_max_travel_time(&self, direct: Option<u64>) -> Option<u64> {
        let direct = direct?;
        match (&self.formula, self.params.max_detour) {
            (Some(formula), _)   => formula.max_travel_time(direct),
            (None, Some(detour)) => Some(detour.apply(direct)),
            (None, None)         => None,
        }
    }

    /// `Some(self.id)` if `position` lies in the service area.
    pub fn position_in_zone(&self, topology: &dyn Topology, position: NodeId) -> SimResult<Option<OperatorId>> {
        let Some(zone) = &self.zone else {
            return Ok(Some(self.id));
        };
        let point = topology.position_localisation(position)?;
        Ok(zone.contains(point).then_some(self.id))
    }

    // ── Stop points ───────────────────────────────────────────────────────

    /// Register a stop point.  Ids are unique across stop and depot points.
    pub fn add_stop_point(&mut self, point: StopPoint) -> SimResult<()> {
        if self.stop_points.contains_key(&point.id) || self.depot_points.contains_key(&point.id) {
            return Err(SimError::config(format!("{} already has a point {}", self.name, point.id)));
        }
        self.stop_points.insert(point.id.clone(), point);
        Ok(())
    }

    /// Register a depot at `position` under the id `depot-{n}`.
    pub fn add_depot_point(&mut self, position: NodeId) -> SimResult<StopPointId> {
        let id = StopPointId::new(format!("depot-{}", self.depot_points.len()));
        if self.stop_points.contains_key(&id) {
            return Err(SimError::config(format!("stop point id {id} is reserved for depots")));
        }
        self.depot_points.insert(id.clone(), StopPoint::new(id.clone(), id.as_str(), position));
        Ok(id)
    }

    /// Stop point or depot point `id`.
    pub fn service_point(&self, id: &StopPointId) -> SimResult<&StopPoint> {
        self.stop_points
            .get(id)
            .or_else(|| self.depot_points.get(id))
            .ok_or_else(|| SimError::UnknownStopPoint(id.clone()))
    }

    pub fn service_point_mut(&mut self, id: &StopPointId) -> SimResult<&mut StopPoint> {
        match self.stop_points.get_mut(id) {
            Some(point) => Ok(point),
            None => self.depot_points.get_mut(id).ok_or_else(|| SimError::UnknownStopPoint(id.clone())),
        }
    }

    // ── Trips ─────────────────────────────────────────────────────────────

    /// Register a trip planning.  Without an explicit id the trip is named
    /// `{operator}_T{n}`.
    pub fn add_trip(&mut self, vehicle: Option<VehicleId>, planning: Planning, trip: Option<TripId>) -> SimResult<TripId> {
        let id = trip.unwrap_or_else(|| TripId::new(format!("{}_T{}", self.name, self.trip_count)));
        if self.trips.contains_key(&id) {
            return Err(SimError::config(format!("{} already has a trip {id}", self.name)));
        }
        self.trip_count += 1;
        self.trips.insert(id.clone(), TripSlot { vehicle, planning });
        Ok(id)
    }

    /// Register a timetabled trip visiting stop points at the given
    /// `(arrival, departure)` times.
    pub fn add_timetabled_trip(
        &mut self,
        trip:   TripId,
        route:  RouteKey,
        visits: &[(StopPointId, Tick, Tick)],
    ) -> SimResult<TripId> {
        let mut planning = Planning::with_capacity(visits.len());
        for (id, arrival, departure) in visits {
            let point = self.service_point_mut(id)?;
            point.schedule(trip.clone(), *arrival, *departure);
            planning.push(Stop::Point { id: id.clone(), position: point.position });
        }
        let trip = self.add_trip(None, planning, Some(trip))?;
        self.routes.insert(trip.clone(), route);
        Ok(trip)
    }

    /// Bind `trip` to the vehicle running it.  A trip is bound once.
    pub fn bind_trip(&mut self, trip: &TripId, vehicle: VehicleId) -> SimResult<()> {
        let slot = self.trips.get_mut(trip).ok_or_else(|| SimError::UnknownTrip(trip.clone()))?;
        match slot.vehicle {
            Some(bound) if bound != vehicle => Err(SimError::config(format!(
                "trip {trip} is already run by {bound}"
            ))),
            _ => {
                slot.vehicle = Some(vehicle);
                Ok(())
            }
        }
    }

    /// Every vehicle of the operator, fleet first.
    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.fleet.iter().chain(&self.staff).copied()
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
