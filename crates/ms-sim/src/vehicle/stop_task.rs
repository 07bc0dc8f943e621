//! Execution of one planning stop.
//!
//! A stop can span several suspensions (dwell time, one store probe per
//! transferred unit), so it is a small state machine of its own, driven by
//! the vehicle process that owns it.

use ms_core::{AgentId, EventId, RequestId, StationId, Tick, VehicleId};
use ms_model::{planning, Leg, Operation, Stop};
use ms_sched::{Outcome, Wait, Wake};
use ms_trace::EventKind;

use crate::vehicle::service::{process_stop_list, process_user_stop};
use crate::{SimError, SimResult, World};

pub(crate) enum TaskStep {
    Suspend(StopTask, Wait),
    Done,
}

pub(crate) enum StopTask {
    /// Dropoffs are done; dwelling before the pickups.
    Dwell { stop: Stop, dropoffs: Vec<RequestId>, dropoff_time: Tick, until: Tick },
    /// Moving units between the vehicle and a station.
    Transfer(Transfer),
    /// Operation traced and removed; spending its dwell time.
    OperationDwell { until: Tick },
}

impl StopTask {
    /// Start processing `stop` at the current position.
    pub(crate) fn begin(world: &mut World, vehicle: VehicleId, stop: Stop) -> SimResult<TaskStep> {
        match stop {
            Stop::User { .. } | Stop::Point { .. } => begin_service(world, vehicle, stop),
            Stop::Operation(ref op) => {
                if !world.vehicle(vehicle)?.policy.handles_operations() {
                    log::warn!("{} cannot process {stop}, discarding it", world.vehicle(vehicle)?);
                    remove_stop(world, vehicle, &stop)?;
                    return Ok(TaskStep::Done);
                }
                let transfer = Transfer::new(op, stop.clone());
                transfer.step(world, vehicle)
            }
            Stop::Marker { .. } => {
                remove_stop(world, vehicle, &stop)?;
                Ok(TaskStep::Done)
            }
        }
    }

    pub(crate) fn resume(self, world: &mut World, vehicle: VehicleId, wake: Wake) -> SimResult<TaskStep> {
        // An interrupted dwell keeps its end time.
        if let Wake::Interrupt(_) = wake {
            let now = world.now();
            let until = match &self {
                StopTask::Dwell { until, .. } | StopTask::OperationDwell { until } => Some(*until),
                StopTask::Transfer(_) => None,
            };
            if let Some(until) = until.filter(|&t| now < t) {
                return Ok(TaskStep::Suspend(self, Wait::timeout(until.since(now))));
            }
        }

        match self {
            StopTask::Dwell { stop, dropoffs, dropoff_time, .. } => {
                finish_service(world, vehicle, stop, dropoffs, dropoff_time)?;
                Ok(TaskStep::Done)
            }
            StopTask::Transfer(mut transfer) => {
                transfer.settle(world, vehicle, wake)?;
                transfer.step(world, vehicle)
            }
            StopTask::OperationDwell { .. } => Ok(TaskStep::Done),
        }
    }
}

fn remove_stop(world: &mut World, vehicle: VehicleId, stop: &Stop) -> SimResult<bool> {
    let v = world.vehicle_mut(vehicle)?;
    Ok(planning::remove_stop(&mut v.itinerary.planning, stop))
}

// ── User stops and stop points ────────────────────────────────────────────────

/// Dwell time, then dropoffs.  Pickups wait for the end of the dwell.
fn begin_service(world: &mut World, vehicle: VehicleId, stop: Stop) -> SimResult<TaskStep> {
    let now = world.now();
    let policy = world.vehicle(vehicle)?.policy.clone();
    let dwell = policy.compute_dwell_time(world, vehicle, &stop)?;

    let dropoffs = match &stop {
        Stop::User { stop: user, .. } if user.leg == Leg::Dropoff => {
            remove_stop(world, vehicle, &stop)?;
            process_user_stop(world, vehicle, *user)?.into_iter().collect()
        }
        Stop::Point { id, .. } => {
            let v = world.vehicle(vehicle)?;
            let (operator, trip) = (v.operator, v.itinerary.trip.clone());
            if let Some(trip) = trip {
                let point = world.operator_mut(operator)?.service_point_mut(id)?;
                point.effective_arrival.entry(trip.clone()).or_insert(now);
                point.effective_departure.insert(trip, now + dwell);
            }
            process_stop_list(world, vehicle, id, Leg::Dropoff)?
        }
        _ => Vec::new(),
    };

    let task = StopTask::Dwell { stop, dropoffs, dropoff_time: now, until: now + dwell };
    Ok(TaskStep::Suspend(task, Wait::timeout(dwell)))
}

fn finish_service(
    world:        &mut World,
    vehicle:      VehicleId,
    stop:         Stop,
    dropoffs:     Vec<RequestId>,
    dropoff_time: Tick,
) -> SimResult<()> {
    remove_stop(world, vehicle, &stop)?;

    let pickups = match &stop {
        Stop::User { stop: user, .. } if user.leg == Leg::Pickup => {
            process_user_stop(world, vehicle, *user)?.into_iter().collect()
        }
        Stop::Point { id, .. } => process_stop_list(world, vehicle, id, Leg::Pickup)?,
        _ => Vec::new(),
    };

    let v = world.vehicle(vehicle)?;
    let operator = v.operator;
    let event = EventKind::Stop {
        operator:     world.operator(operator)?.agent,
        vehicle:      v.agent(),
        trip:         v.itinerary.trip.clone(),
        position:     stop.position(),
        dropoffs:     dropoffs.clone(),
        dropoff_time,
        pickups:      pickups.clone(),
        pickup_time:  world.now(),
    };
    let vehicle_agent = v.agent();

    for id in dropoffs.iter().chain(&pickups) {
        let rider = world.request(operator, *id)?.agent();
        world.trace(rider, event.clone())?;
    }
    world.trace(vehicle_agent, event)
}

// ── Repositioning operations ──────────────────────────────────────────────────

#[derive(Copy, Clone)]
enum Probe {
    Get(EventId),
    Put(EventId, AgentId),
}

/// Unit-by-unit transfer of a repositioning operation.
///
/// Each unit is a store probe raced against a zero delay, so the transfer
/// stops as soon as the station has nothing left to give or no room left.
pub(crate) struct Transfer {
    stop:      Stop,
    station:   Option<StationId>,
    goal:      i64,
    done:      i64,
    targets:   Vec<AgentId>,
    probe:     Option<Probe>,
    exhausted: bool,
}

impl Transfer {
    fn new(op: &Operation, stop: Stop) -> Self {
        Self {
            stop,
            station:   op.station,
            goal:      op.total,
            done:      0,
            targets:   Vec::new(),
            probe:     None,
            exhausted: false,
        }
    }

    /// Probe the next unit, or wrap the operation up.
    fn step(mut self, world: &mut World, vehicle: VehicleId) -> SimResult<TaskStep> {
        let Some(station) = self.station.filter(|_| !self.exhausted) else {
            return self.finish(world, vehicle);
        };
        let cabin = &world.vehicle(vehicle)?.cabin;

        let probe = if self.goal < 0 && self.done > self.goal && !cabin.is_full() {
            let st = world.stations.get_mut(station.index()).ok_or(SimError::UnknownStation(station))?;
            Probe::Get(st.store.get(&mut world.sched)?)
        } else if self.goal > 0 && self.done < self.goal {
            let Some(unit) = cabin.last() else {
                return self.finish(world, vehicle);
            };
            let st = world.stations.get_mut(station.index()).ok_or(SimError::UnknownStation(station))?;
            Probe::Put(st.store.put(&mut world.sched, unit)?, unit)
        } else {
            return self.finish(world, vehicle);
        };

        let event = match probe {
            Probe::Get(e) | Probe::Put(e, _) => e,
        };
        self.probe = Some(probe);
        Ok(TaskStep::Suspend(StopTask::Transfer(self), Wait::event_or_timeout(event, 0u64)))
    }

    /// Apply the result of the pending probe.
    fn settle(&mut self, world: &mut World, vehicle: VehicleId, wake: Wake) -> SimResult<()> {
        let (Some(probe), Some(station)) = (self.probe.take(), self.station) else {
            return Ok(());
        };
        let (event, is_get) = match probe {
            Probe::Get(e) => (e, true),
            Probe::Put(e, _) => (e, false),
        };

        let outcome = match wake {
            Wake::Event { event: e, outcome } if e == event => Some(outcome),
            _ => {
                let st = world.stations.get_mut(station.index()).ok_or(SimError::UnknownStation(station))?;
                let withdrawn = if is_get { st.store.cancel_get(event) } else { st.store.cancel_put(event) };
                // Not withdrawn means the store served the probe meanwhile.
                if withdrawn { None } else { world.sched.state(event)?.outcome() }
            }
        };

        let position = world.station(station)?.position;
        match probe {
            Probe::Get(_) => match outcome.and_then(Outcome::item) {
                Some(unit) => {
                    world.vehicle_mut(vehicle)?.cabin.board(unit, 1)?;
                    world.agents.get_mut(unit)?.vehicle = Some(vehicle);
                    self.done -= 1;
                    self.targets.push(unit);
                }
                None => self.exhausted = true,
            },
            Probe::Put(_, unit) => {
                if outcome.is_some_and(Outcome::is_success) {
                    world.vehicle_mut(vehicle)?.cabin.alight(unit);
                    let record = world.agents.get_mut(unit)?;
                    record.vehicle = None;
                    record.position = position;
                    self.done += 1;
                    self.targets.push(unit);
                } else {
                    self.exhausted = true;
                }
            }
        }
        Ok(())
    }

    /// Trace the operation, remove it and spend the dwell time.
    fn finish(self, world: &mut World, vehicle: VehicleId) -> SimResult<TaskStep> {
        let now = world.now();
        let structure = match self.station {
            Some(id) => Some(world.station(id)?.agent),
            None => None,
        };
        let staff = world.vehicle(vehicle)?.agent();
        if self.done != self.goal {
            log::info!("{} moved {} of {} units", world.vehicle(vehicle)?, self.done, self.goal);
        }

        let event = EventKind::StaffOperation {
            staff,
            total:   self.done,
            goal:    self.goal,
            targets: self.targets.clone(),
            structure,
        };
        for &unit in &self.targets {
            world.trace(unit, event.clone())?;
        }
        if let Some(agent) = structure {
            world.trace(agent, event.clone())?;
        }
        world.trace(staff, event)?;

        remove_stop(world, vehicle, &self.stop)?;
        let policy = world.vehicle(vehicle)?.policy.clone();
        let dwell = policy.compute_dwell_time(world, vehicle, &self.stop)?;
        Ok(TaskStep::Suspend(StopTask::OperationDwell { until: now + dwell }, Wait::timeout(dwell)))
    }
}
