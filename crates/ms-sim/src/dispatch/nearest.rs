//! Online insertion at the end of the nearest vehicle's planning.

use ms_core::{OperatorId, RequestId, VehicleId};
use ms_model::{Leg, Stop};

use crate::dispatch::Dispatcher;
use crate::operator::OperationParameters;
use crate::{SimResult, World};

/// Assigns each request to the fleet vehicle that reaches its pickup the
/// soonest once its current planning is done, among the vehicles with
/// enough free seats at that point.
#[derive(Debug, Default)]
pub struct NearestVehicle;

impl NearestVehicle {
    pub const KEY: &'static str = "nearest_vehicle";

    pub fn factory(_params: &OperationParameters) -> SimResult<Box<dyn Dispatcher>> {
        Ok(Box::new(NearestVehicle))
    }
}

/// Seats occupied once `vehicle` has executed its whole planning.
fn projected_load(world: &World, operator: OperatorId, vehicle: VehicleId) -> SimResult<i64> {
    let v = world.vehicle(vehicle)?;
    let mut load = i64::from(v.cabin.load());
    for stop in &v.itinerary.planning {
        let Some(user) = stop.user_ref() else { continue };
        let Ok(request) = world.request(operator, user.request) else { continue };
        let seats = i64::from(request.seats);
        match user.leg {
            Leg::Pickup  => load += seats,
            Leg::Dropoff => load -= seats,
        }
    }
    Ok(load)
}

impl Dispatcher for NearestVehicle {
    fn name(&self) -> &'static str {
        "NearestVehicle"
    }

    fn online_dispatch(&mut self, world: &mut World, operator: OperatorId, request: RequestId) -> SimResult<()> {
        let (pickup, dropoff, seats) = {
            let r = world.request(operator, request)?;
            (r.stop(Leg::Pickup)?.clone(), r.stop(Leg::Dropoff)?.clone(), r.seats)
        };

        let op = world.operator(operator)?;
        let in_zone = op.position_in_zone(world.topology.as_ref(), pickup.position)?.is_some()
            && op.position_in_zone(world.topology.as_ref(), dropoff.position)?.is_some();
        if !in_zone {
            log::debug!("{op} request {request} is outside the service area");
            return world.leave_out(operator, request);
        }

        let fleet = op.fleet.clone();
        let mut best: Option<(u64, VehicleId)> = None;
        for vid in fleet {
            let v = world.vehicle(vid)?;
            let free = i64::from(v.cabin.seats) - projected_load(world, operator, vid)?;
            if free < i64::from(seats) {
                continue;
            }
            let from = v.planning().last().map_or(v.body.position, Stop::position);
            let Ok(secs) = world.travel_time(from, pickup.position) else { continue };
            if best.is_none_or(|(b, _)| secs < b) {
                best = Some((secs, vid));
            }
        }

        let Some((secs, vid)) = best else {
            return world.leave_out(operator, request);
        };

        let trip = world.vehicle(vid)?.itinerary.trip.clone();
        world.request_mut(operator, request)?.set_trip(trip);
        let mut planning = world.vehicle(vid)?.planning().to_vec();
        planning.push(Stop::user(&pickup));
        planning.push(Stop::user(&dropoff));
        log::debug!("request {request} assigned to {} ({secs}s from pickup)", world.vehicle(vid)?);
        world.set_planning(vid, planning)
    }
}
