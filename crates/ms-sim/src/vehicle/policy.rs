//! Behavioural hooks of service vehicles.

use ms_core::VehicleId;
use ms_model::{planning, Leg, Stop, UserStop, UserStopRef};

use crate::operator::requests::resolve_request;
use crate::{SimResult, World};

/// Decisions a service vehicle delegates while processing its planning.
///
/// Every hook has a default matching the plain on-demand vehicle, so a
/// policy only overrides what makes its service different.
pub trait StopPolicy {
    fn name(&self) -> &'static str;

    /// Whether `vehicle` processes `stop` now.
    ///
    /// The default serves user stops bound to the trip the vehicle runs
    /// (an unbound stop matches a vehicle running no trip).
    fn serve_stop(&self, world: &World, vehicle: VehicleId, stop: &UserStop) -> SimResult<bool> {
        Ok(stop.trip == world.vehicle(vehicle)?.itinerary.trip)
    }

    /// Called when the pickup `stop` does not fit in the vehicle.
    fn exceeds_capacity(&self, world: &mut World, vehicle: VehicleId, stop: UserStopRef) -> SimResult<()> {
        let v = world.vehicle(vehicle)?;
        log::warn!("{v} cannot serve stop {stop}, the vehicle is full");
        Ok(())
    }

    /// Seconds spent at `stop` between the dropoffs and the pickups.
    ///
    /// A stop point consumes its next scheduled visit for the vehicle trip;
    /// every other stop uses the vehicle's dwell time.
    fn compute_dwell_time(&self, world: &mut World, vehicle: VehicleId, stop: &Stop) -> SimResult<u64> {
        let v = world.vehicle(vehicle)?;
        let (dwell, operator, trip) = (v.itinerary.dwell_time, v.operator, v.itinerary.trip.clone());

        if let (Stop::Point { id, .. }, Some(trip)) = (stop, trip) {
            let point = world.operator_mut(operator)?.service_point_mut(id)?;
            if let Some((arrival, departure)) = point.pop_schedule(&trip) {
                return Ok(departure.since(arrival));
            }
        }
        Ok(dwell)
    }

    /// Whether repositioning operations can be executed.
    fn handles_operations(&self) -> bool {
        false
    }
}

// ── DefaultStops ──────────────────────────────────────────────────────────────

/// Plain on-demand service.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultStops;

impl StopPolicy for DefaultStops {
    fn name(&self) -> &'static str {
        "default"
    }
}

// ── RepositioningStops ────────────────────────────────────────────────────────

/// Staff vehicles moving station stock.
#[derive(Copy, Clone, Debug, Default)]
pub struct RepositioningStops;

impl StopPolicy for RepositioningStops {
    fn name(&self) -> &'static str {
        "repositioning"
    }

    fn handles_operations(&self) -> bool {
        true
    }
}

// ── TimetabledStops ───────────────────────────────────────────────────────────

/// Public transport following a timetable.
///
/// Every rider queued at a stop point is evaluated when a vehicle calls
/// there, so a pickup is only served for riders heading the same way as the
/// vehicle, to a stop point it still visits.  Dropoffs are served for riders
/// on board.
#[derive(Copy, Clone, Debug, Default)]
pub struct TimetabledStops;

impl StopPolicy for TimetabledStops {
    fn name(&self) -> &'static str {
        "timetabled"
    }

    fn serve_stop(&self, world: &World, vehicle: VehicleId, stop: &UserStop) -> SimResult<bool> {
        let v = world.vehicle(vehicle)?;
        let operator = world.operator(v.operator)?;
        let request = world.request(v.operator, stop.request)?;

        match stop.leg {
            Leg::Pickup => {
                // An unbound stop matches any route and direction.
                if let Some(trip) = &stop.trip {
                    let same_way = v.itinerary.route.is_some() && operator.routes.get(trip) == v.itinerary.route.as_ref();
                    if !same_way {
                        return Ok(false);
                    }
                }
                let destination = request.stop(Leg::Dropoff)?;
                Ok(match &destination.stop_point {
                    Some(point) => planning::visits_point(v.planning(), point),
                    None => v.planning().iter().any(|s| s.position() == destination.position),
                })
            }
            Leg::Dropoff => Ok(v.cabin.contains(request.agent())),
        }
    }

    /// A rider expecting this very trip gives up: its dropoff is withdrawn
    /// and the request fails.
    fn exceeds_capacity(&self, world: &mut World, vehicle: VehicleId, stop: UserStopRef) -> SimResult<()> {
        let v = world.vehicle(vehicle)?;
        let (operator, trip) = (v.operator, v.itinerary.trip.clone());
        log::warn!("{v} cannot serve stop {stop}, the vehicle is full");

        let request = world.request(operator, stop.request)?;
        if trip.is_none() || request.stop(Leg::Pickup)?.trip != trip {
            return Ok(());
        }
        let dropoff_point = request.stop(Leg::Dropoff)?.stop_point.clone();
        let pickup_event = request.pickup_event;

        if let Some(point) = dropoff_point {
            world
                .operator_mut(operator)?
                .service_point_mut(&point)?
                .remove_user_stop(stop.twin());
        }
        resolve_request(world, operator, stop.request, false)?;
        if world.sched.is_pending(pickup_event) {
            world.sched.fail(pickup_event)?;
        }
        Ok(())
    }
}
