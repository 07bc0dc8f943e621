//! Vehicle processes walking a planning.

use ms_core::{AgentId, NodeId, Tick, VehicleId};
use ms_model::{planning, Stop};
use ms_sched::{Wait, Wake};
use ms_trace::{EventKind, LeaveOutcome};

use crate::operator::IdleBehaviour;
use crate::vehicle::stop_task::{StopTask, TaskStep};
use crate::{Process, SimError, SimResult, Step, World};

/// Planned arrival time of `stop`, if it has one.
///
/// Stop points use the next scheduled visit of the vehicle's trip.
pub(crate) fn planned_arrival(world: &World, vehicle: VehicleId, stop: &Stop) -> SimResult<Option<Tick>> {
    let v = world.vehicle(vehicle)?;
    Ok(match stop {
        Stop::User { stop, .. } => world
            .request(v.operator, stop.request)
            .ok()
            .and_then(|r| r.stop(stop.leg).ok())
            .and_then(|s| s.times.arrival),
        Stop::Point { id, .. } => match &v.itinerary.trip {
            Some(trip) => world.operator(v.operator)?.service_point(id)?.next_arrival(trip),
            None => None,
        },
        Stop::Operation(op) => op.times.arrival,
        Stop::Marker { .. } => None,
    })
}

fn set_position(world: &mut World, vehicle: VehicleId, position: NodeId) -> SimResult<()> {
    let v = world.vehicle_mut(vehicle)?;
    v.body.position = position;
    let agent = v.agent();
    world.agents.get_mut(agent)?.position = position;
    Ok(())
}

// ── FleetRunner ───────────────────────────────────────────────────────────────

enum FleetState {
    Ready,
    Idle { since: Tick },
    Moving { to: NodeId, until: Tick },
    Holding { until: Tick },
    Serving(StopTask),
}

/// Process of on-demand and repositioning vehicles.
///
/// ```text
/// loop:
///   planning empty → idle until the signal fires (or the idle timeout)
///   head elsewhere → move there
///   head planned later → hold until its planned arrival
///   otherwise      → process the head stop
/// ```
///
/// The head is read again after every suspension, so a planning replaced
/// while the vehicle travels or holds is picked up at the next step.
pub struct FleetRunner {
    vehicle: VehicleId,
    agent:   AgentId,
    state:   FleetState,
}

impl FleetRunner {
    pub fn new(vehicle: VehicleId, agent: AgentId) -> Self {
        Self { vehicle, agent, state: FleetState::Ready }
    }

    fn advance(&mut self, world: &mut World) -> SimResult<Step> {
        loop {
            let now = world.now();
            let v = world.vehicle(self.vehicle)?;
            let position = v.body.position;
            let Some(head) = v.itinerary.planning.first().cloned() else {
                return self.go_idle(world);
            };
            let occupants = v.cabin.agents();

            let target = head.position();
            if target != position {
                match world.route(position, target) {
                    Ok((path, duration)) => {
                        world.vehicle_mut(self.vehicle)?.itinerary.temp_destination = Some(target);
                        let event = EventKind::Move { from: position, to: target, duration, path, occupants };
                        world.trace(self.agent, event)?;
                        self.state = FleetState::Moving { to: target, until: now + duration };
                        return Ok(Step::Wait(Wait::timeout(duration)));
                    }
                    Err(SimError::Spatial(e)) => {
                        log::warn!("{} cannot reach {head} ({e}), dropping the stop", world.vehicle(self.vehicle)?);
                        let v = world.vehicle_mut(self.vehicle)?;
                        planning::remove_stop(&mut v.itinerary.planning, &head);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(arrival) = planned_arrival(world, self.vehicle, &head)?.filter(|&t| t > now) {
                let duration = arrival.since(now);
                world.vehicle_mut(self.vehicle)?.itinerary.holding = true;
                world.trace(self.agent, EventKind::Wait { duration })?;
                self.state = FleetState::Holding { until: arrival };
                return Ok(Step::Wait(Wait::timeout(duration)));
            }

            match StopTask::begin(world, self.vehicle, head)? {
                TaskStep::Suspend(task, wait) => {
                    self.state = FleetState::Serving(task);
                    return Ok(Step::Wait(wait));
                }
                TaskStep::Done => continue,
            }
        }
    }

    /// Planned arrival of the head stop when the vehicle already stands there.
    fn head_arrival(&self, world: &World) -> SimResult<Option<Tick>> {
        let v = world.vehicle(self.vehicle)?;
        match v.itinerary.planning.first() {
            Some(head) if head.position() == v.body.position => planned_arrival(world, self.vehicle, head),
            _ => Ok(None),
        }
    }

    fn go_idle(&mut self, world: &mut World) -> SimResult<Step> {
        let now = world.now();
        let operator = world.vehicle(self.vehicle)?.operator;
        let behaviour = world.operator(operator)?.params.idle;

        let v = world.vehicle_mut(self.vehicle)?;
        v.itinerary.is_idle = true;
        v.itinerary.temp_destination = None;
        let mut wait = Wait::event(v.itinerary.signal);
        if let IdleBehaviour::Timeout(secs) = behaviour {
            wait = wait.or_timeout(secs);
        }
        self.state = FleetState::Idle { since: now };
        Ok(Step::Wait(wait))
    }
}

impl Process for FleetRunner {
    fn agent(&self) -> Option<AgentId> {
        Some(self.agent)
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        let now = world.now();
        match std::mem::replace(&mut self.state, FleetState::Ready) {
            FleetState::Ready => {
                if wake == Wake::Start {
                    let position = world.vehicle(self.vehicle)?.body.position;
                    world.trace(self.agent, EventKind::Input { position })?;
                }
            }
            FleetState::Idle { since } => {
                world.vehicle_mut(self.vehicle)?.itinerary.is_idle = false;
                let duration = now.since(since);
                if duration > 0 {
                    world.trace(self.agent, EventKind::Idle { duration })?;
                }
            }
            FleetState::Moving { to, until } => {
                if matches!(wake, Wake::Interrupt(_)) && now < until {
                    self.state = FleetState::Moving { to, until };
                    return Ok(Step::Wait(Wait::timeout(until.since(now))));
                }
                set_position(world, self.vehicle, to)?;
            }
            FleetState::Holding { until } => {
                // Replanned with the same head: keep holding without a new trace.
                if matches!(wake, Wake::Interrupt(_)) && now < until && self.head_arrival(world)? == Some(until) {
                    self.state = FleetState::Holding { until };
                    return Ok(Step::Wait(Wait::timeout(until.since(now))));
                }
                world.vehicle_mut(self.vehicle)?.itinerary.holding = false;
            }
            FleetState::Serving(task) => match task.resume(world, self.vehicle, wake)? {
                TaskStep::Suspend(task, wait) => {
                    self.state = FleetState::Serving(task);
                    return Ok(Step::Wait(wait));
                }
                TaskStep::Done => {}
            },
        }
        self.advance(world)
    }
}

// ── TimetableRunner ───────────────────────────────────────────────────────────

enum TimetableState {
    Ready,
    /// At the first stop of a trip, waiting for its scheduled arrival.
    Departure,
    Moving { to: NodeId, until: Tick },
    Serving(StopTask),
}

/// Process of public transport vehicles.
///
/// Runs every trip of the trip list in order: copy the trip planning from
/// the operator, appear at the first stop, then reach each stop exactly at
/// its scheduled arrival and process it.  Leaves once the trip list is
/// exhausted.
pub struct TimetableRunner {
    vehicle:   VehicleId,
    agent:     AgentId,
    next_trip: usize,
    state:     TimetableState,
}

impl TimetableRunner {
    pub fn new(vehicle: VehicleId, agent: AgentId) -> Self {
        Self { vehicle, agent, next_trip: 0, state: TimetableState::Ready }
    }

    fn start_trip(&mut self, world: &mut World) -> SimResult<Step> {
        loop {
            let v = world.vehicle(self.vehicle)?;
            let Some(trip) = v.itinerary.trip_list.get(self.next_trip).cloned() else {
                return Ok(Step::Exit(LeaveOutcome::Success));
            };
            self.next_trip += 1;

            let operator = world.operator(v.operator)?;
            let Some(slot) = operator.trips.get(&trip) else {
                log::warn!("{} has no trip {trip}, skipping it", operator.name);
                continue;
            };
            let planning = slot.planning.clone();
            let route = operator.routes.get(&trip).cloned();
            let Some(first) = planning.first().map(Stop::position) else {
                continue;
            };

            let v = world.vehicle_mut(self.vehicle)?;
            let from = v.body.position;
            v.itinerary.trip = Some(trip);
            v.itinerary.route = route;
            v.itinerary.planning = planning;
            v.itinerary.temp_destination = Some(first);

            if from != first {
                let event = EventKind::Move { from, to: first, duration: 0, path: vec![from, first], occupants: Vec::new() };
                world.trace(self.agent, event)?;
                set_position(world, self.vehicle, first)?;
            }

            let now = world.now();
            let head = world.vehicle(self.vehicle)?.itinerary.planning.first().cloned();
            let departure = match head {
                Some(stop) => planned_arrival(world, self.vehicle, &stop)?.unwrap_or(now),
                None => now,
            };
            self.state = TimetableState::Departure;
            return Ok(Step::Wait(Wait::timeout(departure.since(now))));
        }
    }

    /// Travel to the next stop so as to arrive at its scheduled time.
    fn follow(&mut self, world: &mut World) -> SimResult<Step> {
        let now = world.now();
        let v = world.vehicle(self.vehicle)?;
        let Some(next) = v.itinerary.planning.first().cloned() else {
            return self.start_trip(world);
        };
        let (from, to) = (v.body.position, next.position());
        let (operator, trip) = (v.operator, v.itinerary.trip.clone());
        let occupants = v.cabin.agents();

        let arrival = planned_arrival(world, self.vehicle, &next)?.unwrap_or(now);
        let duration = arrival.since(now);
        if let (Stop::Point { id, .. }, Some(trip)) = (&next, trip) {
            let point = world.operator_mut(operator)?.service_point_mut(id)?;
            point.effective_arrival.insert(trip, now + duration);
        }

        let path = if from == to {
            vec![from]
        } else {
            match world.route(from, to) {
                Ok((path, _)) => path,
                Err(SimError::Spatial(_)) => vec![from, to],
                Err(e) => return Err(e),
            }
        };
        world.trace(self.agent, EventKind::Move { from, to, duration, path, occupants })?;
        world.vehicle_mut(self.vehicle)?.itinerary.temp_destination = Some(to);
        self.state = TimetableState::Moving { to, until: now + duration };
        Ok(Step::Wait(Wait::timeout(duration)))
    }

    fn serve_head(&mut self, world: &mut World) -> SimResult<Step> {
        let Some(head) = world.vehicle(self.vehicle)?.itinerary.planning.first().cloned() else {
            return self.start_trip(world);
        };
        match StopTask::begin(world, self.vehicle, head)? {
            TaskStep::Suspend(task, wait) => {
                self.state = TimetableState::Serving(task);
                Ok(Step::Wait(wait))
            }
            TaskStep::Done => self.follow(world),
        }
    }
}

impl Process for TimetableRunner {
    fn agent(&self) -> Option<AgentId> {
        Some(self.agent)
    }

    fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
        let now = world.now();
        match std::mem::replace(&mut self.state, TimetableState::Ready) {
            TimetableState::Ready => {
                if wake == Wake::Start {
                    let position = world.vehicle(self.vehicle)?.body.position;
                    world.trace(self.agent, EventKind::Input { position })?;
                }
                self.start_trip(world)
            }
            TimetableState::Departure => self.serve_head(world),
            TimetableState::Moving { to, until } => {
                if matches!(wake, Wake::Interrupt(_)) && now < until {
                    self.state = TimetableState::Moving { to, until };
                    return Ok(Step::Wait(Wait::timeout(until.since(now))));
                }
                set_position(world, self.vehicle, to)?;
                self.serve_head(world)
            }
            TimetableState::Serving(task) => match task.resume(world, self.vehicle, wake)? {
                TaskStep::Suspend(task, wait) => {
                    self.state = TimetableState::Serving(task);
                    Ok(Step::Wait(wait))
                }
                TaskStep::Done => self.follow(world),
            },
        }
    }
}
