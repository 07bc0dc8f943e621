//! Trip request lifecycle: creation, assignment, deadline and cancellation.

use ms_core::{AgentId, NodeId, OperatorId, RequestId, StopPointId, Tick, TripId};
use ms_model::{planning, Leg, RequestResult, Stop, UserStop, UserStopRef};
use ms_sched::{Wait, Wake};
use ms_trace::LeaveOutcome;

use crate::{Process, SimError, SimResult, Step, World};

/// What a rider asks an operator for.
#[derive(Clone, Debug, PartialEq)]
pub struct TripQuery {
    pub origin:             NodeId,
    pub destination:        NodeId,
    /// Board at this stop point instead of `origin`.
    pub origin_stop:        Option<StopPointId>,
    /// Alight at this stop point instead of `destination`.
    pub destination_stop:   Option<StopPointId>,
    pub seats:              u32,
    /// `(requested, max)` service times of the pickup.
    pub pickup_window:      (Option<Tick>, Option<Tick>),
    pub dropoff_window:     (Option<Tick>, Option<Tick>),
    pub trip:               Option<TripId>,
    /// Computed from the topology when absent.
    pub direct_travel_time: Option<u64>,
}

impl TripQuery {
    pub fn new(origin: NodeId, destination: NodeId) -> Self {
        Self {
            origin,
            destination,
            origin_stop:        None,
            destination_stop:   None,
            seats:              1,
            pickup_window:      (None, None),
            dropoff_window:     (None, None),
            trip:               None,
            direct_travel_time: None,
        }
    }

    pub fn seats(mut self, seats: u32) -> Self {
        self.seats = seats;
        self
    }

    pub fn pickup_window(mut self, requested: Option<Tick>, max: Option<Tick>) -> Self {
        self.pickup_window = (requested, max);
        self
    }

    pub fn dropoff_window(mut self, requested: Option<Tick>, max: Option<Tick>) -> Self {
        self.dropoff_window = (requested, max);
        self
    }

    pub fn via_stop_points(mut self, origin: StopPointId, destination: StopPointId) -> Self {
        self.origin_stop = Some(origin);
        self.destination_stop = Some(destination);
        self
    }

    pub fn on_trip(mut self, trip: TripId) -> Self {
        self.trip = Some(trip);
        self
    }

    pub fn direct_travel_time(mut self, secs: u64) -> Self {
        self.direct_travel_time = Some(secs);
        self
    }
}

/// Set the success flag of a request and resolve its completion event.
pub(crate) fn resolve_request(world: &mut World, operator: OperatorId, id: RequestId, success: bool) -> SimResult<()> {
    let World { operators, sched, .. } = world;
    let request = operators
        .get_mut(operator.index())
        .and_then(|o| o.requests.get_mut(&id))
        .ok_or(SimError::UnknownRequest { operator, request: id })?;
    request.request.success = Some(success);
    if success {
        request.request.succeed(sched)?;
    } else {
        request.request.fail(sched)?;
    }
    Ok(())
}

impl World {
    /// Create a trip request of `agent` from `query` and register it.
    ///
    /// Fills in the direct travel time when the query has none and derives
    /// the maximum travel time from the operator parameters.  Requests
    /// through stop points are queued on those points.  A pickup max time
    /// arms a [`PickupDeadline`].
    pub fn create_trip_request(&mut self, operator: OperatorId, agent: AgentId, query: TripQuery) -> SimResult<RequestId> {
        let op = self.operator(operator)?;
        let origin = match &query.origin_stop {
            Some(id) => op.service_point(id)?.position,
            None => query.origin,
        };
        let destination = match &query.destination_stop {
            Some(id) => op.service_point(id)?.position,
            None => query.destination,
        };

        let direct = match query.direct_travel_time {
            Some(secs) => Some(secs),
            None => match self.travel_time(origin, destination) {
                Ok(secs) => Some(secs),
                Err(SimError::Spatial(e)) => {
                    log::debug!("no direct travel time for {agent}: {e}");
                    None
                }
                Err(e) => return Err(e),
            },
        };

        let World { operators, sched, .. } = self;
        let op = operators.get_mut(operator.index()).ok_or(SimError::UnknownOperator(operator))?;
        let id = op.new_request(sched, agent, query.seats);
        let max_travel_time = op.compute_max_travel_time(direct);

        let mut pickup = UserStop::new(Leg::Pickup, origin, id).with_window(query.pickup_window.0, query.pickup_window.1);
        let mut dropoff =
            UserStop::new(Leg::Dropoff, destination, id).with_window(query.dropoff_window.0, query.dropoff_window.1);
        pickup.max_travel_time = max_travel_time;
        dropoff.max_travel_time = max_travel_time;
        pickup.stop_point = query.origin_stop.clone();
        dropoff.stop_point = query.destination_stop.clone();

        let request = op.requests.get_mut(&id).ok_or(SimError::UnknownRequest { operator, request: id })?;
        request.set_stops(pickup, dropoff)?;
        request.set_trip(query.trip.clone());
        request.direct_travel_time = direct;

        if let Some(point) = &query.origin_stop {
            op.service_point_mut(point)?.add_user_stop(UserStopRef::pickup(id));
        }
        if let Some(point) = &query.destination_stop {
            op.service_point_mut(point)?.add_user_stop(UserStopRef::dropoff(id));
        }

        self.summary.requests_created += 1;
        if let Some(deadline) = query.pickup_window.1 {
            let name = format!("deadline-{}-{id}", self.operator(operator)?.name);
            self.spawn(name, Box::new(PickupDeadline::new(operator, id, deadline)));
        }
        Ok(id)
    }

    /// Hand a request to the operator's online dispatcher.
    ///
    /// Without one, a request queued at a stop point waits there for the
    /// vehicles calling at it; any other request is left out.
    pub fn assign_request(&mut self, operator: OperatorId, id: RequestId) -> SimResult<()> {
        let Some(mut dispatcher) = self.operator_mut(operator)?.online.take() else {
            if self.request(operator, id)?.stop(Leg::Pickup)?.stop_point.is_some() {
                return Ok(());
            }
            return self.leave_out(operator, id);
        };
        let result = dispatcher.online_dispatch(self, operator, id);
        self.operator_mut(operator)?.online = Some(dispatcher);
        result
    }

    /// Record that no vehicle could take the request.
    pub fn leave_out(&mut self, operator: OperatorId, id: RequestId) -> SimResult<()> {
        let op = self.operator_mut(operator)?;
        op.left_out.push(id);
        log::info!("{op} could not assign request {id}");
        self.summary.requests_left_out += 1;
        Ok(())
    }

    /// Withdraw a request from every structure of the operator.
    ///
    /// The request is marked cancelled and its pending events fail.  Its
    /// stops are purged from every fleet and staff planning and from every
    /// stop point and depot list.  A rider already on board keeps its
    /// dropoff so it still gets delivered.  Cancelling twice is a no-op.
    pub fn cancel_request(&mut self, operator: OperatorId, id: RequestId) -> SimResult<()> {
        let request = self.request(operator, id)?;
        if request.request.cancelled {
            return Ok(());
        }
        let agent = request.agent();
        let (pickup_event, dropoff_event, unresolved) =
            (request.pickup_event, request.dropoff_event, request.request.success.is_none());
        let aboard = match request.request.result {
            Some(RequestResult::Vehicle(v)) => self.agents.get(agent)?.vehicle == Some(v),
            _ => false,
        };

        if unresolved {
            resolve_request(self, operator, id, false)?;
        }
        self.request_mut(operator, id)?.request.cancelled = true;
        if self.sched.is_pending(pickup_event) {
            self.sched.fail(pickup_event)?;
        }
        if !aboard && self.sched.is_pending(dropoff_event) {
            self.sched.fail(dropoff_event)?;
        }

        let op = self.operator_mut(operator)?;
        op.left_out.retain(|&r| r != id);
        for point in op.stop_points.values_mut().chain(op.depot_points.values_mut()) {
            point.purge_request(id, aboard);
        }
        let vehicles: Vec<_> = op.vehicles().collect();
        for vehicle in vehicles {
            let itinerary = &mut self.vehicle_mut(vehicle)?.itinerary;
            if planning::purge_request(&mut itinerary.planning, id, aboard) > 0 {
                itinerary.temp_destination = itinerary.planning.first().map(Stop::position);
            }
        }

        self.summary.requests_cancelled += 1;
        log::info!("{} cancelled request {id} of {agent}", self.operator(operator)?);
        Ok(())
    }
}

// ── PickupDeadline ────────────────────────────────────────────────────────────

/// Fails a request whose pickup did not happen by its max time.
///
/// The window is inclusive, so the check runs one second after the max
/// time.
pub struct PickupDeadline {
    operator: OperatorId,
    request:  RequestId,
    deadline: Tick,
}

impl PickupDeadline {
    pub fn new(operator: OperatorId, request: RequestId, deadline: Tick) -> Self {
        Self { operator, request, deadline }
    }
}

impl Process for PickupDeadline {
    fn agent(&self) -> Option<AgentId> {
        None
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        if wake == Wake::Start {
            let at = self.deadline + 1;
            return Ok(Step::Wait(Wait::timeout(at.since(world.now()))));
        }

        let request = world.request(self.operator, self.request)?;
        let event = request.pickup_event;
        if world.sched.is_pending(event) && !request.request.is_dismissed() {
            log::info!("request {} was not picked up by {}", self.request, self.deadline);
            resolve_request(world, self.operator, self.request, false)?;
            world.sched.fail(event)?;
        }
        Ok(Step::Exit(LeaveOutcome::Success))
    }
}
