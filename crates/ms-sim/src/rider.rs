//! Rider processes: trip requests to an operator and station-based sharing.

use ms_core::{AgentId, EventId, NodeId, OperatorId, RequestId, StationId, Tick};
use ms_model::{Request, RequestKind, RequestResult, Structure};
use ms_sched::{Outcome, Wait, Wake};
use ms_trace::{EventKind, LeaveOutcome, RequestRecord, FAIL_GET, FAIL_PUT};

use crate::operator::TripQuery;
use crate::vehicle::service::request_record;
use crate::{Process, SimError, SimResult, Step, World};

/// Walk from the current position to `to`: trace the move and return its
/// duration.  An unreachable target is reached instantly.
fn walk(world: &mut World, agent: AgentId, to: NodeId) -> SimResult<u64> {
    let from = world.agents.get(agent)?.position;
    if from == to {
        return Ok(0);
    }
    let (path, duration) = match world.route(from, to) {
        Ok(route) => route,
        Err(e) => {
            log::warn!("{agent} cannot walk from {from} to {to}: {e}");
            (vec![from, to], 0)
        }
    };
    world.trace(agent, EventKind::Move { from, to, duration, path, occupants: Vec::new() })?;
    Ok(duration)
}

fn arrive(world: &mut World, agent: AgentId, position: NodeId) -> SimResult<Step> {
    world.agents.get_mut(agent)?.position = position;
    world.trace(agent, EventKind::DestinationReached { position })?;
    Ok(Step::Exit(LeaveOutcome::Success))
}

// ── TripRider ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone)]
enum TripState {
    Ready,
    Departing,
    /// Waiting for the pickup until `deadline`, if the rider has a patience.
    Waiting { deadline: Option<Tick> },
    Riding,
    Walking,
}

/// A rider asking an operator for a ride and waiting to be carried.
pub struct TripRider {
    agent:    AgentId,
    operator: OperatorId,
    query:    TripQuery,
    depart:   Tick,
    /// Seconds the rider waits for a pickup.  `None` waits forever.
    patience: Option<u64>,
    request:  Option<RequestId>,
    state:    TripState,
}

impl TripRider {
    pub fn new(agent: AgentId, operator: OperatorId, query: TripQuery, depart: Tick, patience: Option<u64>) -> Self {
        Self { agent, operator, query, depart, patience, request: None, state: TripState::Ready }
    }

    fn request(&self) -> SimResult<RequestId> {
        self.request.ok_or_else(|| SimError::logic(format!("{} has no request yet", self.agent)))
    }

    /// Cancel the request, trace it and leave without a vehicle.
    fn give_up(&self, world: &mut World) -> SimResult<Step> {
        let id = self.request()?;
        world.cancel_request(self.operator, id)?;
        let record = request_record(world, self.operator, id)?;
        world.trace(self.agent, EventKind::Request(record))?;
        Ok(Step::Exit(LeaveOutcome::failure(FAIL_GET)))
    }

    fn request_ride(&mut self, world: &mut World) -> SimResult<Step> {
        let id = world.create_trip_request(self.operator, self.agent, self.query.clone())?;
        self.request = Some(id);
        world.assign_request(self.operator, id)?;
        if world.operator(self.operator)?.left_out.contains(&id) {
            return self.give_up(world);
        }

        let event = world.request(self.operator, id)?.pickup_event;
        let deadline = self.patience.map(|p| world.now() + p);
        self.state = TripState::Waiting { deadline };
        Ok(Step::Wait(self.pickup_wait(world, event, deadline)))
    }

    fn pickup_wait(&self, world: &World, event: EventId, deadline: Option<Tick>) -> Wait {
        match deadline {
            Some(at) => Wait::event_or_timeout(event, at.since(world.now())),
            None => Wait::event(event),
        }
    }

    fn picked_up(&mut self, world: &mut World) -> SimResult<Step> {
        let id = self.request()?;
        let request = world.request(self.operator, id)?;
        let aboard = match request.request.result {
            Some(RequestResult::Vehicle(v)) => world.agents.get(self.agent)?.vehicle == Some(v),
            _ => false,
        };
        if !aboard {
            log::warn!("{} was not boarded by request {id}", self.agent);
            return self.give_up(world);
        }
        let event = request.dropoff_event;
        self.state = TripState::Riding;
        Ok(Step::Wait(Wait::event(event)))
    }

    fn dropped_off(&mut self, world: &mut World, outcome: Outcome) -> SimResult<Step> {
        if let Some(v) = world.agents.get(self.agent)?.vehicle {
            return Err(SimError::logic(format!("{} is still aboard {v} after its dropoff", self.agent)));
        }
        if !outcome.is_success() {
            return Err(SimError::logic(format!("dropoff of {} failed while aboard", self.agent)));
        }
        let duration = walk(world, self.agent, self.query.destination)?;
        if duration == 0 {
            return arrive(world, self.agent, self.query.destination);
        }
        self.state = TripState::Walking;
        Ok(Step::Wait(Wait::timeout(duration)))
    }
}

impl Process for TripRider {
    fn agent(&self) -> Option<AgentId> {
        Some(self.agent)
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        match (self.state, wake) {
            (TripState::Ready, _) => {
                world.agents.get_mut(self.agent)?.position = self.query.origin;
                world.trace(self.agent, EventKind::Input { position: self.query.origin })?;
                self.state = TripState::Departing;
                Ok(Step::Wait(Wait::timeout(self.depart.since(world.now()))))
            }
            (TripState::Departing, _) => self.request_ride(world),
            (TripState::Waiting { .. }, Wake::Event { outcome, .. }) if outcome.is_success() => self.picked_up(world),
            (TripState::Waiting { deadline }, Wake::Interrupt(_)) => {
                let event = world.request(self.operator, self.request()?)?.pickup_event;
                Ok(Step::Wait(self.pickup_wait(world, event, deadline)))
            }
            (TripState::Waiting { .. }, _) => {
                log::debug!("{} gives up waiting for a pickup", self.agent);
                self.give_up(world)
            }
            (TripState::Riding, Wake::Event { outcome, .. }) => self.dropped_off(world, outcome),
            (TripState::Riding, _) => {
                let event = world.request(self.operator, self.request()?)?.dropoff_event;
                Ok(Step::Wait(Wait::event(event)))
            }
            (TripState::Walking, _) => arrive(world, self.agent, self.query.destination),
        }
    }
}

// ── StationRider ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone)]
enum StationState {
    Ready,
    ToOrigin,
    Getting { since: Tick, deadline: Option<Tick> },
    Riding { unit: AgentId },
    Putting { unit: AgentId, since: Tick, deadline: Option<Tick> },
    ToDestination,
}

/// A rider taking a shared unit at one station and returning it at another.
pub struct StationRider {
    agent:       AgentId,
    origin:      NodeId,
    destination: NodeId,
    from:        StationId,
    to:          StationId,
    depart:      Tick,
    /// Seconds the rider queues at a station.  `None` waits forever.
    patience:    Option<u64>,
    request:     Option<Request>,
    state:       StationState,
}

impl StationRider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent:       AgentId,
        origin:      NodeId,
        destination: NodeId,
        from:        StationId,
        to:          StationId,
        depart:      Tick,
        patience:    Option<u64>,
    ) -> Self {
        Self { agent, origin, destination, from, to, depart, patience, request: None, state: StationState::Ready }
    }

    /// Open a request at `station` backed by a store event.
    fn open(&mut self, world: &mut World, station: StationId, kind: RequestKind, unit: Option<AgentId>) -> SimResult<Wait> {
        let now = world.now();
        let mut request = Request::new(&mut world.sched, self.agent, Structure::Station(station), kind);
        let World { stations, sched, .. } = world;
        let store = &mut stations.get_mut(station.index()).ok_or(SimError::UnknownStation(station))?.store;
        let event = match unit {
            Some(unit) => store.put(sched, unit)?,
            None => store.get(sched)?,
        };
        request.set_event(event);
        self.request = Some(request);
        let deadline = self.patience.map(|p| now + p);
        Ok(self.store_wait(now, event, deadline))
    }

    fn store_wait(&self, now: Tick, event: EventId, deadline: Option<Tick>) -> Wait {
        match deadline {
            Some(at) => Wait::event_or_timeout(event, at.since(now)),
            None => Wait::event(event),
        }
    }

    /// Close the open request and trace it.
    fn close(&mut self, world: &mut World, station: StationId, since: Tick, success: bool) -> SimResult<()> {
        let Some(mut request) = self.request.take() else {
            return Err(SimError::logic(format!("{} has no open station request", self.agent)));
        };
        request.success = Some(success);
        request.wait_sequence.push(world.now().signed_since(since));
        let record = RequestRecord {
            id:            None,
            agent:         self.agent,
            structure:     world.station(station)?.agent,
            kind:          request.kind.as_str(),
            success:       request.success,
            wait_sequence: request.wait_sequence,
        };
        world.trace(self.agent, EventKind::Request(record))
    }

    fn pending_event(&self) -> SimResult<EventId> {
        self.request
            .as_ref()
            .map(Request::event)
            .ok_or_else(|| SimError::logic(format!("{} has no open station request", self.agent)))
    }

    /// Outcome of the open store event once the wait ended.  A timeout that
    /// raced a same-instant resolution keeps the resolution.
    fn settle(&self, world: &mut World, station: StationId, wake: &Wake) -> SimResult<Option<Outcome>> {
        let event = self.pending_event()?;
        if let Wake::Event { outcome, .. } = wake {
            return Ok(Some(*outcome));
        }
        let store = &mut world.station_mut(station)?.store;
        let withdrawn = store.cancel_get(event) || store.cancel_put(event);
        if withdrawn {
            return Ok(None);
        }
        Ok(world.sched.state(event)?.outcome())
    }

    fn start_ride(&mut self, world: &mut World, unit: AgentId) -> SimResult<Step> {
        let from = world.station(self.from)?.position;
        let to = world.station(self.to)?.position;
        let (path, duration) = match world.route(from, to) {
            Ok(route) => route,
            Err(e) => {
                log::warn!("{} cannot ride from {from} to {to}: {e}", self.agent);
                (vec![from, to], 0)
            }
        };
        world.trace(self.agent, EventKind::GetVehicle { vehicle: unit })?;
        world.trace(self.agent, EventKind::Move { from, to, duration, path, occupants: vec![self.agent] })?;
        self.state = StationState::Riding { unit };
        Ok(Step::Wait(Wait::timeout(duration)))
    }

    fn walk_out(&mut self, world: &mut World) -> SimResult<Step> {
        let duration = walk(world, self.agent, self.destination)?;
        if duration == 0 {
            return arrive(world, self.agent, self.destination);
        }
        self.state = StationState::ToDestination;
        Ok(Step::Wait(Wait::timeout(duration)))
    }
}

impl Process for StationRider {
    fn agent(&self) -> Option<AgentId> {
        Some(self.agent)
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        match self.state {
            StationState::Ready => {
                if wake == Wake::Start {
                    world.agents.get_mut(self.agent)?.position = self.origin;
                    world.trace(self.agent, EventKind::Input { position: self.origin })?;
                    return Ok(Step::Wait(Wait::timeout(self.depart.since(world.now()))));
                }
                let station = world.station(self.from)?.position;
                let duration = walk(world, self.agent, station)?;
                self.state = StationState::ToOrigin;
                Ok(Step::Wait(Wait::timeout(duration)))
            }
            StationState::ToOrigin => {
                let now = world.now();
                let position = world.station(self.from)?.position;
                world.agents.get_mut(self.agent)?.position = position;
                let wait = self.open(world, self.from, RequestKind::Get, None)?;
                self.state = StationState::Getting { since: now, deadline: self.patience.map(|p| now + p) };
                Ok(Step::Wait(wait))
            }
            StationState::Getting { since, deadline } => {
                if matches!(wake, Wake::Interrupt(_)) {
                    return Ok(Step::Wait(self.store_wait(world.now(), self.pending_event()?, deadline)));
                }
                match self.settle(world, self.from, &wake)?.and_then(Outcome::item) {
                    Some(unit) => {
                        self.close(world, self.from, since, true)?;
                        self.start_ride(world, unit)
                    }
                    None => {
                        self.close(world, self.from, since, false)?;
                        Ok(Step::Exit(LeaveOutcome::failure(FAIL_GET)))
                    }
                }
            }
            StationState::Riding { unit } => {
                let now = world.now();
                let position = world.station(self.to)?.position;
                world.agents.get_mut(self.agent)?.position = position;
                world.agents.get_mut(unit)?.position = position;
                let wait = self.open(world, self.to, RequestKind::Put, Some(unit))?;
                self.state = StationState::Putting { unit, since: now, deadline: self.patience.map(|p| now + p) };
                Ok(Step::Wait(wait))
            }
            StationState::Putting { unit, since, deadline } => {
                if matches!(wake, Wake::Interrupt(_)) {
                    return Ok(Step::Wait(self.store_wait(world.now(), self.pending_event()?, deadline)));
                }
                let stored = self.settle(world, self.to, &wake)?.is_some_and(Outcome::is_success);
                self.close(world, self.to, since, stored)?;
                if !stored {
                    return Ok(Step::Exit(LeaveOutcome::failure(FAIL_PUT)));
                }
                world.trace(self.agent, EventKind::LeaveVehicle { vehicle: unit })?;
                self.walk_out(world)
            }
            StationState::ToDestination => arrive(world, self.agent, self.destination),
        }
    }
}
