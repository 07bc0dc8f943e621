//! Pickup and dropoff transitions of user stops.

use ms_core::{OperatorId, RequestId, StopPointId, VehicleId};
use ms_model::{planning, Leg, RequestResult, UserStopRef};
use ms_sched::Payload;
use ms_trace::{EventKind, RequestRecord};

use crate::operator::requests::resolve_request;
use crate::{SimResult, World};

/// Snapshot of a trip request for the traces.
pub(crate) fn request_record(world: &World, operator: OperatorId, id: RequestId) -> SimResult<RequestRecord> {
    let structure = world.operator(operator)?.agent;
    let request = world.request(operator, id)?;
    Ok(RequestRecord {
        id:            Some(id),
        agent:         request.agent(),
        structure,
        kind:          request.request.kind.as_str(),
        success:       request.request.success,
        wait_sequence: request.request.wait_sequence.clone(),
    })
}

/// Board the rider of `id` and resolve its pickup event.
pub(crate) fn pickup(world: &mut World, vehicle: VehicleId, id: RequestId) -> SimResult<()> {
    let now = world.now();
    let (operator, vehicle_agent) = {
        let v = world.vehicle(vehicle)?;
        (v.operator, v.agent())
    };

    resolve_request(world, operator, id, true)?;
    let request = world.request_mut(operator, id)?;
    request.request.result = Some(RequestResult::Vehicle(vehicle));
    if let Some(requested) = request.stop(Leg::Pickup)?.requested_time {
        request.request.wait_sequence.push(now.signed_since(requested));
    }
    request.stop_mut(Leg::Pickup)?.times.effective_departure = Some(now);
    let (rider, seats, event) = (request.agent(), request.seats, request.pickup_event);

    let record = request_record(world, operator, id)?;
    world.trace(rider, EventKind::Request(record))?;

    world.vehicle_mut(vehicle)?.cabin.board(rider, seats)?;
    world.agents.get_mut(rider)?.vehicle = Some(vehicle);
    world.trace(rider, EventKind::GetVehicle { vehicle: vehicle_agent })?;

    if world.sched.is_pending(event) {
        world.sched.succeed(event, Payload::Empty)?;
    }
    log::debug!("{} picked up request {id} of {rider}", world.vehicle(vehicle)?);
    Ok(())
}

/// Drop the rider of `id` off and move the request to the fulfilled ledger.
pub(crate) fn dropoff(world: &mut World, vehicle: VehicleId, id: RequestId) -> SimResult<()> {
    let now = world.now();
    let (operator, vehicle_agent, position) = {
        let v = world.vehicle(vehicle)?;
        (v.operator, v.agent(), v.body.position)
    };

    let request = world.request_mut(operator, id)?;
    request.stop_mut(Leg::Dropoff)?.times.effective_arrival = Some(now);
    if let Some(detour) = request.detour() {
        request.request.wait_sequence.push(detour);
    }
    let (rider, event) = (request.agent(), request.dropoff_event);

    world.vehicle_mut(vehicle)?.cabin.alight(rider);
    let record = world.agents.get_mut(rider)?;
    record.vehicle = None;
    record.position = position;
    world.trace(rider, EventKind::LeaveVehicle { vehicle: vehicle_agent })?;

    if world.sched.is_pending(event) {
        world.sched.succeed(event, Payload::Empty)?;
    }
    world.operator_mut(operator)?.fulfilled.push(id);
    world.summary.requests_fulfilled += 1;
    log::debug!("{} dropped off request {id} of {rider}", world.vehicle(vehicle)?);
    Ok(())
}

/// Try to process one user stop.  Returns the request id when the stop was
/// actually served.
///
/// Stops the vehicle must not serve, dismissed requests and pickups that do
/// not fit are skipped; none of them interrupts the vehicle.
pub(crate) fn process_user_stop(world: &mut World, vehicle: VehicleId, stop: UserStopRef) -> SimResult<Option<RequestId>> {
    let (operator, policy) = {
        let v = world.vehicle(vehicle)?;
        (v.operator, v.policy.clone())
    };
    let Ok(request) = world.request(operator, stop.request) else {
        log::warn!("{} has no request behind stop {stop}, skipping it", world.vehicle(vehicle)?);
        return Ok(None);
    };
    let Ok(user_stop) = request.stop(stop.leg).cloned() else {
        log::warn!("request {} has no {} stop, skipping it", stop.request, stop.leg);
        return Ok(None);
    };
    let (rider, seats) = (request.agent(), request.seats);

    if stop.leg == Leg::Pickup && request.request.is_dismissed() {
        let v = world.vehicle_mut(vehicle)?;
        planning::purge_request(&mut v.itinerary.planning, stop.request, false);
        log::debug!("{v} skips dismissed request {}", stop.request);
        return Ok(None);
    }
    if !policy.serve_stop(world, vehicle, &user_stop)? {
        return Ok(None);
    }

    let now = world.now();
    if let Some(planned) = user_stop.process_time().filter(|&t| t != now) {
        log::warn!("{} processes {stop} at {now} instead of the planned {planned}", world.vehicle(vehicle)?);
    }

    match stop.leg {
        Leg::Pickup => {
            if world.vehicle(vehicle)?.cabin.fits(seats) {
                pickup(world, vehicle, stop.request)?;
                Ok(Some(stop.request))
            } else {
                world.summary.capacity_refusals += 1;
                policy.exceeds_capacity(world, vehicle, stop)?;
                Ok(None)
            }
        }
        Leg::Dropoff => {
            if !world.vehicle(vehicle)?.cabin.contains(rider) {
                log::warn!("{} cannot drop off {rider}, who is not on board", world.vehicle(vehicle)?);
                return Ok(None);
            }
            dropoff(world, vehicle, stop.request)?;
            Ok(Some(stop.request))
        }
    }
}

/// Process every queued `leg` stop of a stop point.
///
/// Served stops leave the list, and so do stops of dismissed requests whose
/// rider is not on board.  The others stay for a later vehicle.
pub(crate) fn process_stop_list(
    world:   &mut World,
    vehicle: VehicleId,
    point:   &StopPointId,
    leg:     Leg,
) -> SimResult<Vec<RequestId>> {
    let operator = world.vehicle(vehicle)?.operator;
    let queued = world.operator(operator)?.service_point(point)?.list(leg).to_vec();

    let mut served = Vec::new();
    for stop in queued {
        let done = process_user_stop(world, vehicle, stop)?;
        let stale = match world.request(operator, stop.request) {
            Ok(r) => r.request.is_dismissed() && world.agents.get(r.agent())?.vehicle.is_none(),
            Err(_) => true,
        };
        if done.is_some() || stale {
            world.operator_mut(operator)?.service_point_mut(point)?.remove_user_stop(stop);
        }
        served.extend(done);
    }
    Ok(served)
}
