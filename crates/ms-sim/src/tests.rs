//! Integration tests for ms-sim.

use ms_core::{AgentId, GeoPoint, NodeId, OperatorId, RequestId, SimConfig, Tick, TransportMode};
use ms_spatial::{RoadNetwork, RoadNetworkBuilder};
use ms_trace::{EventKind, LeaveOutcome, FAIL_GET};

use crate::operator::{OperationParameters, TripQuery};
use crate::vehicle::{RouteKey, VehicleKind};
use crate::{NoopObserver, Sim, SimBuilder, VehicleSpec};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Nodes in a line, `secs[i]` seconds between node `i` and node `i + 1`.
fn line_network(secs: &[u32]) -> (RoadNetwork, Vec<NodeId>) {
    let mut b = RoadNetworkBuilder::new();
    let nodes: Vec<NodeId> = (0..=secs.len())
        .map(|i| b.add_node(GeoPoint::new(45.0 + i as f32 * 0.01, 4.8)))
        .collect();
    for (i, &s) in secs.iter().enumerate() {
        b.add_road(nodes[i], nodes[i + 1], 1_000.0, s);
    }
    (b.build(), nodes)
}

fn builder(limit: u64, secs: &[u32]) -> (SimBuilder, Vec<NodeId>) {
    let (net, nodes) = line_network(secs);
    let b = SimBuilder::new(SimConfig::new(limit, 42), Box::new(net)).unwrap();
    (b, nodes)
}

fn outcome(sim: &Sim, name: &str) -> LeaveOutcome {
    sim.trace_of(name).and_then(|t| t.leave_outcome()).cloned().unwrap()
}

fn times_of(sim: &Sim, name: &str, kind: &str) -> Vec<Tick> {
    sim.trace_of(name).unwrap().of_kind(kind).map(|e| e.time).collect()
}

/// `(total, goal)` of every repositioning operation traced on `name`.
fn staff_operations(sim: &Sim, name: &str) -> Vec<(i64, i64)> {
    sim.trace_of(name)
        .unwrap()
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::StaffOperation { total, goal, .. } => Some((*total, *goal)),
            _ => None,
        })
        .collect()
}

fn failure_get() -> LeaveOutcome {
    LeaveOutcome::failure(FAIL_GET)
}

// ── Timetabled service ────────────────────────────────────────────────────────

#[cfg(test)]
mod timetable_tests {
    use super::*;
    use crate::agents::population;
    use crate::vehicle::{StopPolicy, TimetabledStops};
    use ms_core::StopPointId;
    use ms_model::{RequestStatus, UserStopRef};
    use ms_sched::Outcome;

    fn route() -> RouteKey {
        RouteKey { route: "L1".into(), direction: 0 }
    }

    #[derive(Default)]
    struct Leaves {
        count: usize,
    }

    impl crate::SimObserver for Leaves {
        fn on_agent_left(&mut self, _time: Tick, _agent: AgentId, _outcome: &LeaveOutcome) {
            self.count += 1;
        }
    }

    #[test]
    fn full_vehicle_refuses_second_rider() {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let op = b.add_operator("bus", TransportMode::Transit, OperationParameters::default()).unwrap();
        let s0 = b.add_stop_point(op, "S0", "Gare", n[0]).unwrap();
        let s2 = b.add_stop_point(op, "S2", "Mairie", n[2]).unwrap();
        let trip = b
            .add_timetabled_trip(op, "T0", route(), &[(s0.clone(), Tick(100), Tick(130)), (s2.clone(), Tick(400), Tick(430))])
            .unwrap();
        let bus = b.add_vehicle(VehicleSpec::new("bus-1", op, VehicleKind::Timetabled, n[0], 1)).unwrap();
        b.assign_trips(bus, &[trip.clone()]).unwrap();
        for name in ["alice", "bob"] {
            let query = TripQuery::new(n[0], n[2]).via_stop_points(s0.clone(), s2.clone()).on_trip(trip.clone());
            b.add_trip_rider(name, op, query, Tick(0), None).unwrap();
        }

        let mut sim = b.build().unwrap();
        let mut leaves = Leaves::default();
        let summary = sim.run(&mut leaves).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::Success);
        assert_eq!(outcome(&sim, "bob"), failure_get());
        assert_eq!(outcome(&sim, "bus-1"), LeaveOutcome::Success);
        assert_eq!(summary.capacity_refusals, 1);
        assert_eq!(summary.requests_fulfilled, 1);
        assert_eq!(summary.requests_cancelled, 1);
        assert_eq!(leaves.count, 3);

        assert_eq!(times_of(&sim, "alice", "get_vehicle"), vec![Tick(130)]);
        assert_eq!(times_of(&sim, "alice", "leave_vehicle"), vec![Tick(400)]);

        let operator = sim.world.operator(op).unwrap();
        for point in [&s0, &s2] {
            let sp = operator.service_point(point).unwrap();
            assert!(sp.pickups.is_empty() && sp.dropoffs.is_empty(), "{sp} still has stops");
        }
        assert_eq!(operator.service_point(&s0).unwrap().effective_departure.get(&trip), Some(&Tick(130)));
    }

    #[test]
    fn refused_boarding_resolves_the_request() {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let op = b.add_operator("bus", TransportMode::Transit, OperationParameters::default()).unwrap();
        let s0 = b.add_stop_point(op, "S0", "Gare", n[0]).unwrap();
        let s2 = b.add_stop_point(op, "S2", "Mairie", n[2]).unwrap();
        let trip = b
            .add_timetabled_trip(op, "T0", route(), &[(s0.clone(), Tick(100), Tick(130)), (s2.clone(), Tick(400), Tick(430))])
            .unwrap();
        let bus = b.add_vehicle(VehicleSpec::new("bus-1", op, VehicleKind::Timetabled, n[0], 1)).unwrap();

        let w = b.world_mut();
        let bob = w.agents.add("bob", population::RIDERS, n[0]).unwrap();
        let query = TripQuery::new(n[0], n[2]).via_stop_points(s0.clone(), s2.clone()).on_trip(trip.clone());
        let id = w.create_trip_request(op, bob, query).unwrap();
        w.vehicle_mut(bus).unwrap().itinerary.trip = Some(trip);
        let completion = w.request(op, id).unwrap().request.event();

        TimetabledStops.exceeds_capacity(w, bus, UserStopRef::pickup(id)).unwrap();

        let request = w.request(op, id).unwrap();
        assert_eq!(request.request.success, Some(false));
        assert_eq!(w.sched.state(completion).unwrap().outcome(), Some(Outcome::Failed));
        assert_eq!(w.sched.state(request.pickup_event).unwrap().outcome(), Some(Outcome::Failed));
        assert!(w.operator(op).unwrap().service_point(&s2).unwrap().dropoffs.is_empty());

        // Cancelling afterwards does not resolve a second time.
        let fresh = request.request.event();
        w.cancel_request(op, id).unwrap();
        assert_eq!(w.request(op, id).unwrap().status(), RequestStatus::Cancelled);
        assert!(w.sched.is_pending(fresh));
    }

    #[test]
    fn dropoff_frees_the_seat_before_pickup() {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let op = b.add_operator("bus", TransportMode::Transit, OperationParameters::default()).unwrap();
        let ids: Vec<StopPointId> = (0..3)
            .map(|i| b.add_stop_point(op, &format!("S{i}"), &format!("stop {i}"), n[i]).unwrap())
            .collect();
        let visits = [
            (ids[0].clone(), Tick(100), Tick(130)),
            (ids[1].clone(), Tick(300), Tick(330)),
            (ids[2].clone(), Tick(500), Tick(530)),
        ];
        let trip = b.add_timetabled_trip(op, "T0", route(), &visits).unwrap();
        let bus = b.add_vehicle(VehicleSpec::new("bus-1", op, VehicleKind::Timetabled, n[0], 1)).unwrap();
        b.assign_trips(bus, &[trip.clone()]).unwrap();

        let first = TripQuery::new(n[0], n[1]).via_stop_points(ids[0].clone(), ids[1].clone()).on_trip(trip.clone());
        let second = TripQuery::new(n[1], n[2]).via_stop_points(ids[1].clone(), ids[2].clone()).on_trip(trip.clone());
        b.add_trip_rider("alice", op, first, Tick(0), None).unwrap();
        b.add_trip_rider("bob", op, second, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::Success);
        assert_eq!(outcome(&sim, "bob"), LeaveOutcome::Success);
        assert_eq!(summary.capacity_refusals, 0);
        assert_eq!(summary.requests_fulfilled, 2);
        assert_eq!(times_of(&sim, "alice", "leave_vehicle"), vec![Tick(300)]);
        assert_eq!(times_of(&sim, "bob", "get_vehicle"), vec![Tick(330)]);
    }
}

// ── On-demand service ─────────────────────────────────────────────────────────

#[cfg(test)]
mod on_demand_tests {
    use super::*;
    use ms_model::{Leg, RequestStatus, Stop};
    use ms_sched::Outcome;

    fn taxi_params() -> OperationParameters {
        OperationParameters::default().with_dispatcher("nearest_vehicle")
    }

    #[test]
    fn missed_pickup_deadline_cancels_request() {
        let (mut b, n) = builder(2_000, &[100, 100, 100]);
        let op = b.add_operator("taxi", TransportMode::Car, taxi_params()).unwrap();
        let taxi = b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[3], 4)).unwrap();
        let query = TripQuery::new(n[0], n[1]).pickup_window(Some(Tick(0)), Some(Tick(150)));
        b.add_trip_rider("alice", op, query, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), failure_get());
        assert_eq!(summary.requests_cancelled, 1);
        assert_eq!(summary.requests_fulfilled, 0);

        let request = sim.world.request(op, RequestId(0)).unwrap();
        assert_eq!(sim.world.sched.state(request.pickup_event).unwrap().outcome(), Some(Outcome::Failed));
        assert!(!request.is_feasible(Leg::Pickup));
        assert_eq!(request.status(), RequestStatus::Cancelled);
        assert!(sim.world.vehicle(taxi).unwrap().planning().is_empty());
        // The taxi still drove to the pickup it was heading for.
        assert_eq!(sim.world.vehicle(taxi).unwrap().body.position, n[0]);
    }

    #[test]
    fn detour_alone_without_pickup_window() {
        let (mut b, n) = builder(3_000, &[900]);
        let op = b.add_operator("taxi", TransportMode::Car, taxi_params()).unwrap();
        b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4).dwell_time(30)).unwrap();
        let query = TripQuery::new(n[0], n[1]).direct_travel_time(600);
        b.add_trip_rider("alice", op, query, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::Success);
        let request = sim.world.request(op, RequestId(0)).unwrap();
        assert_eq!(request.detour(), Some(300));
        assert_eq!(request.request.wait_sequence, vec![300]);
        assert_eq!(times_of(&sim, "alice", "get_vehicle"), vec![Tick(30)]);
        assert_eq!(times_of(&sim, "alice", "leave_vehicle"), vec![Tick(930)]);
    }

    #[test]
    fn stop_point_service_boards_then_alights() {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let op = b.add_operator("shuttle", TransportMode::Car, OperationParameters::default()).unwrap();
        let s0 = b.add_stop_point(op, "S0", "Gare", n[0]).unwrap();
        let s2 = b.add_stop_point(op, "S2", "Mairie", n[2]).unwrap();
        let spec = VehicleSpec::new("shuttle-1", op, VehicleKind::OnDemand, n[1], 4).dwell_time(20);
        let shuttle = b.add_vehicle(spec).unwrap();
        let planning = vec![
            Stop::Point { id: s0.clone(), position: n[0] },
            Stop::Point { id: s2.clone(), position: n[2] },
        ];
        b.world_mut().set_planning(shuttle, planning).unwrap();
        let query = TripQuery::new(n[0], n[2]).via_stop_points(s0.clone(), s2.clone());
        b.add_trip_rider("alice", op, query, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::Success);
        assert_eq!(summary.requests_fulfilled, 1);
        let boarding: Vec<(&str, Tick)> = sim
            .trace_of("alice")
            .unwrap()
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::GetVehicle { .. } | EventKind::LeaveVehicle { .. }))
            .map(|e| (e.kind.name(), e.time))
            .collect();
        assert_eq!(boarding, vec![("get_vehicle", Tick(120)), ("leave_vehicle", Tick(320))]);

        // Pickups after the dwell, dropoffs on arrival.
        let none: Vec<RequestId> = Vec::new();
        let stops: Vec<(Tick, NodeId, Vec<RequestId>, Vec<RequestId>)> = sim
            .trace_of("shuttle-1")
            .unwrap()
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Stop { position, dropoffs, pickups, .. } => {
                    Some((e.time, *position, dropoffs.clone(), pickups.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(stops, vec![
            (Tick(120), n[0], none.clone(), vec![RequestId(0)]),
            (Tick(340), n[2], vec![RequestId(0)], none),
        ]);

        let operator = sim.world.operator(op).unwrap();
        for point in [&s0, &s2] {
            let sp = operator.service_point(point).unwrap();
            assert!(sp.pickups.is_empty() && sp.dropoffs.is_empty(), "{sp} still has stops");
        }
        let v = sim.world.vehicle(shuttle).unwrap();
        assert!(v.planning().is_empty() && v.cabin.is_empty());
        // No pickup window: only the detour is recorded.
        let request = sim.world.request(op, RequestId(0)).unwrap();
        assert_eq!(request.request.wait_sequence, vec![0]);
    }

    #[test]
    fn shared_ride_drains_the_planning() {
        let (mut b, n) = builder(3_000, &[100, 100]);
        let op = b.add_operator("taxi", TransportMode::Car, taxi_params()).unwrap();
        let taxi = b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 1)).unwrap();
        b.add_trip_rider("alice", op, TripQuery::new(n[0], n[1]), Tick(0), None).unwrap();
        b.add_trip_rider("bob", op, TripQuery::new(n[1], n[2]), Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::Success);
        assert_eq!(outcome(&sim, "bob"), LeaveOutcome::Success);
        assert_eq!(summary.requests_fulfilled, 2);
        assert_eq!(summary.capacity_refusals, 0);
        assert_eq!(summary.agent_errors, 0);
        let v = sim.world.vehicle(taxi).unwrap();
        assert!(v.planning().is_empty());
        assert!(v.cabin.is_empty());
        assert_eq!(times_of(&sim, "bob", "get_vehicle"), vec![Tick(190)]);
        // Idle at the end of the run.
        assert_eq!(outcome(&sim, "taxi-1"), LeaveOutcome::EndOfSimulation);
    }

    #[test]
    fn empty_fleet_leaves_request_out() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("taxi", TransportMode::Car, taxi_params()).unwrap();
        b.add_trip_rider("alice", op, TripQuery::new(n[0], n[1]), Tick(10), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), failure_get());
        assert_eq!(summary.requests_left_out, 1);
        assert_eq!(summary.requests_cancelled, 1);
        assert_eq!(times_of(&sim, "alice", "leave_simulation"), vec![Tick(10)]);
    }

    #[test]
    fn request_without_dispatcher_is_left_out() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("taxi", TransportMode::Car, OperationParameters::default()).unwrap();
        b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4)).unwrap();
        b.add_trip_rider("alice", op, TripQuery::new(n[0], n[1]), Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "alice"), failure_get());
        assert_eq!(summary.requests_left_out, 1);
    }

    #[test]
    fn impatient_rider_gives_up() {
        let (mut b, n) = builder(2_000, &[100, 100, 100]);
        let op = b.add_operator("taxi", TransportMode::Car, taxi_params()).unwrap();
        let taxi = b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[3], 4)).unwrap();
        b.add_trip_rider("alice", op, TripQuery::new(n[0], n[1]), Tick(0), Some(60)).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(outcome(&sim, "alice"), failure_get());
        assert_eq!(times_of(&sim, "alice", "leave_simulation"), vec![Tick(60)]);
        assert!(sim.world.vehicle(taxi).unwrap().planning().is_empty());
    }

    #[test]
    fn idle_timeout_wakes_vehicle_periodically() {
        let (mut b, n) = builder(350, &[100]);
        let params = OperationParameters::from_json(r#"{"dispatcher": "nearest_vehicle", "idle": {"timeout": 100}}"#).unwrap();
        let op = b.add_operator("taxi", TransportMode::Car, params).unwrap();
        b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4)).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(times_of(&sim, "taxi-1", "idle"), vec![Tick(100), Tick(200), Tick(300)]);
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod request_tests {
    use super::*;
    use crate::agents::population;
    use crate::operator::requests::resolve_request;
    use ms_model::Leg;

    fn world_with_request() -> (SimBuilder, OperatorId, RequestId) {
        let (mut b, n) = builder(1_000, &[100, 100]);
        let params = OperationParameters::default().with_dispatcher("nearest_vehicle");
        let op = b.add_operator("taxi", TransportMode::Car, params).unwrap();
        let w = b.world_mut();
        let rider = w.agents.add("alice", population::RIDERS, n[0]).unwrap();
        let id = w.create_trip_request(op, rider, TripQuery::new(n[0], n[2])).unwrap();
        (b, op, id)
    }

    #[test]
    fn created_request_has_twin_stops() {
        let (mut b, op, id) = world_with_request();
        let w = b.world_mut();
        let request = w.request(op, id).unwrap();
        let pickup = request.stop(Leg::Pickup).unwrap();
        let dropoff = request.stop(Leg::Dropoff).unwrap();
        assert_eq!(pickup.twin, Some(dropoff.handle()));
        assert_eq!(dropoff.twin, Some(pickup.handle()));
        assert_eq!(request.direct_travel_time, Some(200));
        assert_eq!(w.summary.requests_created, 1);
    }

    #[test]
    fn max_travel_time_from_formula() {
        let (mut b, n) = builder(1_000, &[300]);
        let params = OperationParameters::from_json(r#"{"max_travel_time": "2 * direct_travel_time + 60"}"#).unwrap();
        let op = b.add_operator("taxi", TransportMode::Car, params).unwrap();
        let w = b.world_mut();
        let rider = w.agents.add("alice", population::RIDERS, n[0]).unwrap();
        let id = w.create_trip_request(op, rider, TripQuery::new(n[0], n[1])).unwrap();
        let request = w.request(op, id).unwrap();
        assert_eq!(request.stop(Leg::Pickup).unwrap().max_travel_time, Some(660));
        assert_eq!(request.stop(Leg::Dropoff).unwrap().max_travel_time, Some(660));
    }

    #[test]
    fn resolution_arms_a_fresh_event() {
        let (mut b, op, id) = world_with_request();
        let w = b.world_mut();
        let first = w.request(op, id).unwrap().request.event();
        resolve_request(w, op, id, true).unwrap();
        let request = w.request(op, id).unwrap();
        assert_eq!(request.request.success, Some(true));
        assert_ne!(request.request.event(), first);
        assert!(w.sched.is_pending(request.request.event()));
        assert!(!w.sched.is_pending(first));
    }

    #[test]
    fn cancel_twice_is_a_noop() {
        let (mut b, op, id) = world_with_request();
        let w = b.world_mut();
        w.cancel_request(op, id).unwrap();
        w.cancel_request(op, id).unwrap();
        assert_eq!(w.summary.requests_cancelled, 1);
        let request = w.request(op, id).unwrap();
        assert_eq!(request.request.success, Some(false));
        assert!(!w.sched.is_pending(request.pickup_event));
        assert!(!w.sched.is_pending(request.dropoff_event));
    }

    #[test]
    fn unknown_request_is_an_error() {
        let (mut b, op, _) = world_with_request();
        assert!(b.world_mut().cancel_request(op, RequestId(99)).is_err());
    }
}

// ── Repositioning ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod repositioning_tests {
    use super::*;
    use ms_model::{Operation, Stop};

    #[test]
    fn take_operation_stops_on_empty_station() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("bikes", TransportMode::Bike, OperationParameters::default()).unwrap();
        let station = b.add_station("gare", n[1], 10, 2, None).unwrap();
        let van = b.add_vehicle(VehicleSpec::new("van-1", op, VehicleKind::Staff, n[1], 5)).unwrap();
        let operation = Operation::new(n[1], -3, Some(station));
        b.world_mut().set_planning(van, vec![Stop::Operation(operation)]).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(staff_operations(&sim, "van-1"), vec![(-2, -3)]);
        assert_eq!(sim.world.station(station).unwrap().stock(), 0);
        let v = sim.world.vehicle(van).unwrap();
        assert_eq!(v.cabin.load(), 2);
        assert!(v.planning().is_empty());
        let unit = sim.world.agents.find("gare-unit-0").unwrap();
        assert_eq!(sim.world.agents.get(unit).unwrap().vehicle, Some(van));
        assert_eq!(staff_operations(&sim, "gare"), vec![(-2, -3)]);
    }

    #[test]
    fn on_demand_vehicle_discards_operations() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("bikes", TransportMode::Bike, OperationParameters::default()).unwrap();
        let station = b.add_station("gare", n[0], 10, 2, None).unwrap();
        let taxi = b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4)).unwrap();
        let operation = Operation::new(n[0], -1, Some(station));
        b.world_mut().set_planning(taxi, vec![Stop::Operation(operation)]).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert!(staff_operations(&sim, "taxi-1").is_empty());
        assert_eq!(sim.world.station(station).unwrap().stock(), 2);
    }

    fn pal_zhang_sim(params: &str) -> (Sim, Vec<ms_core::StationId>) {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let params = OperationParameters::from_json(params).unwrap();
        let op = b.add_operator("bikes", TransportMode::Bike, params).unwrap();
        b.add_depot(op, n[0]).unwrap();
        let full = b.add_station("full", n[1], 10, 10, Some(op)).unwrap();
        let empty = b.add_station("empty", n[2], 10, 0, Some(op)).unwrap();
        b.add_vehicle(VehicleSpec::new("van-1", op, VehicleKind::Staff, n[0], 5)).unwrap();
        (b.build().unwrap(), vec![full, empty])
    }

    #[test]
    fn pal_zhang_balances_stations() {
        let (mut sim, stations) =
            pal_zhang_sim(r#"{"dispatcher": "pal_zhang", "start_times": [100], "durations": [10000]}"#);
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(sim.world.station(stations[0]).unwrap().stock(), 9);
        assert_eq!(sim.world.station(stations[1]).unwrap().stock(), 1);
        assert_eq!(staff_operations(&sim, "van-1"), vec![(-1, -1), (1, 1)]);
        assert_eq!(times_of(&sim, "van-1", "staff_operation"), vec![Tick(200), Tick(330)]);
        // Back at the depot.
        assert_eq!(sim.world.agents.get(sim.world.agents.find("van-1").unwrap()).unwrap().position, NodeId(0));
    }

    #[test]
    fn pal_zhang_records_operations_out_of_time() {
        let (mut sim, stations) =
            pal_zhang_sim(r#"{"dispatcher": "pal_zhang", "start_times": [100], "durations": [50]}"#);
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(staff_operations(&sim, "van-1"), vec![(0, -1), (0, 1)]);
        assert_eq!(times_of(&sim, "van-1", "staff_operation"), vec![Tick(100), Tick(100)]);
        assert_eq!(sim.world.station(stations[0]).unwrap().stock(), 10);
        assert_eq!(sim.world.station(stations[1]).unwrap().stock(), 0);
    }

    #[test]
    fn pal_zhang_without_staff_is_a_config_error() {
        let (mut b, n) = builder(2_000, &[100]);
        let params = OperationParameters::from_json(r#"{"dispatcher": "pal_zhang", "start_times": [100]}"#).unwrap();
        let op = b.add_operator("bikes", TransportMode::Bike, params).unwrap();
        b.add_station("gare", n[1], 10, 10, Some(op)).unwrap();
        let mut sim = b.build().unwrap();
        assert!(sim.run(&mut NoopObserver).is_err());
    }
}

// ── Replanning ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod replanning_tests {
    use super::*;
    use crate::{Process, SimResult, Step, World};
    use ms_core::VehicleId;
    use ms_model::{Operation, Planning, Stop, StopTimes};
    use ms_sched::{Wait, Wake};

    /// Replaces the planning of `vehicle` at `at`, with its own planning
    /// again when `planning` is `None`.
    struct Replan {
        vehicle:  VehicleId,
        at:       u64,
        planning: Option<Planning>,
    }

    impl Process for Replan {
        fn agent(&self) -> Option<AgentId> {
            None
        }

        fn resume(&mut self, world: &mut World, wake: Wake) -> SimResult<Step> {
            if wake == Wake::Start {
                return Ok(Step::Wait(Wait::timeout(self.at)));
            }
            let planning = match self.planning.take() {
                Some(planning) => planning,
                None => world.vehicle(self.vehicle)?.planning().to_vec(),
            };
            world.set_planning(self.vehicle, planning)?;
            Ok(Step::Exit(LeaveOutcome::Success))
        }
    }

    #[test]
    fn holding_survives_a_replanning_with_the_same_head() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("bikes", TransportMode::Bike, OperationParameters::default()).unwrap();
        let station = b.add_station("gare", n[0], 10, 2, None).unwrap();
        let van = b.add_vehicle(VehicleSpec::new("van-1", op, VehicleKind::Staff, n[0], 5)).unwrap();
        let mut operation = Operation::new(n[0], -1, Some(station));
        operation.times = StopTimes::planned(Tick(300), Tick(300));
        let w = b.world_mut();
        w.set_planning(van, vec![Stop::Operation(operation)]).unwrap();
        w.spawn("replan", Box::new(Replan { vehicle: van, at: 100, planning: None }));

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(times_of(&sim, "van-1", "wait"), vec![Tick(0)]);
        assert_eq!(times_of(&sim, "van-1", "staff_operation"), vec![Tick(300)]);
        assert_eq!(staff_operations(&sim, "van-1"), vec![(-1, -1)]);
        assert_eq!(sim.world.station(station).unwrap().stock(), 1);
        assert!(!sim.world.vehicle(van).unwrap().itinerary.holding);
    }

    #[test]
    fn empty_planning_leaves_an_idle_vehicle_asleep() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b.add_operator("taxi", TransportMode::Car, OperationParameters::default()).unwrap();
        let taxi = b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4)).unwrap();
        b.world_mut().spawn("replan", Box::new(Replan { vehicle: taxi, at: 100, planning: Some(Vec::new()) }));

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert!(times_of(&sim, "taxi-1", "idle").is_empty());
        assert_eq!(outcome(&sim, "taxi-1"), LeaveOutcome::EndOfSimulation);
        assert!(sim.world.vehicle(taxi).unwrap().itinerary.is_idle);
    }
}

// ── Station sharing ───────────────────────────────────────────────────────────

#[cfg(test)]
mod station_tests {
    use super::*;

    #[test]
    fn queued_rider_gets_the_returned_unit() {
        let (mut b, n) = builder(2_000, &[100, 100]);
        let c = b.add_station("c", n[0], 2, 1, None).unwrap();
        let a = b.add_station("a", n[1], 2, 0, None).unwrap();
        let dest = b.add_station("b", n[2], 2, 0, None).unwrap();
        b.add_station_rider("waiter", n[1], n[2], a, dest, Tick(0), None).unwrap();
        b.add_station_rider("returner", n[0], n[1], c, a, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(outcome(&sim, "waiter"), LeaveOutcome::Success);
        assert_eq!(outcome(&sim, "returner"), LeaveOutcome::Success);
        assert_eq!(times_of(&sim, "returner", "leave_vehicle"), vec![Tick(100)]);
        assert_eq!(times_of(&sim, "waiter", "get_vehicle"), vec![Tick(100)]);
        assert_eq!(times_of(&sim, "waiter", "leave_vehicle"), vec![Tick(200)]);

        let get = sim
            .trace_of("waiter")
            .unwrap()
            .events()
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::Request(r) if r.kind == "GET" => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(get.success, Some(true));
        assert_eq!(get.wait_sequence, vec![100]);

        assert_eq!(sim.world.station(c).unwrap().stock(), 0);
        assert_eq!(sim.world.station(a).unwrap().stock(), 0);
        assert_eq!(sim.world.station(dest).unwrap().stock(), 1);
    }

    #[test]
    fn impatient_rider_fails_on_empty_station() {
        let (mut b, n) = builder(2_000, &[100]);
        let a = b.add_station("a", n[0], 2, 0, None).unwrap();
        let dest = b.add_station("b", n[1], 2, 0, None).unwrap();
        b.add_station_rider("alice", n[0], n[1], a, dest, Tick(0), Some(120)).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(outcome(&sim, "alice"), failure_get());
        assert_eq!(times_of(&sim, "alice", "leave_simulation"), vec![Tick(120)]);
        assert_eq!(sim.world.station(a).unwrap().store.waiting_getters(), 0);
    }

    #[test]
    fn patient_rider_ends_with_the_simulation() {
        let (mut b, n) = builder(500, &[100]);
        let a = b.add_station("a", n[0], 2, 0, None).unwrap();
        let dest = b.add_station("b", n[1], 2, 0, None).unwrap();
        b.add_station_rider("alice", n[0], n[1], a, dest, Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        assert_eq!(outcome(&sim, "alice"), LeaveOutcome::EndOfSimulation);
    }

    #[test]
    fn overfull_station_is_rejected() {
        let (mut b, n) = builder(500, &[100]);
        assert!(b.add_station("a", n[0], 2, 3, None).is_err());
    }
}

// ── Run loop ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod sim_tests {
    use super::*;
    use crate::agents::population;
    use crate::{Process, SimError, SimResult, Step, World};
    use ms_sched::{Wait, Wake};

    struct Faulty {
        agent: AgentId,
    }

    impl Process for Faulty {
        fn agent(&self) -> Option<AgentId> {
            Some(self.agent)
        }

        fn resume(&mut self, _world: &mut World, wake: Wake) -> SimResult<Step> {
            match wake {
                Wake::Start => Ok(Step::Wait(Wait::timeout(10u64))),
                _ => Err(SimError::logic("cabin overflow")),
            }
        }
    }

    struct Sleeper {
        agent: AgentId,
    }

    impl Process for Sleeper {
        fn agent(&self) -> Option<AgentId> {
            Some(self.agent)
        }

        fn resume(&mut self, _world: &mut World, wake: Wake) -> SimResult<Step> {
            match wake {
                Wake::Start => Ok(Step::Wait(Wait::timeout(50u64))),
                _ => Ok(Step::Exit(LeaveOutcome::Success)),
            }
        }
    }

    #[test]
    fn logic_error_ends_only_the_failing_agent() {
        let (mut b, n) = builder(1_000, &[100]);
        let w = b.world_mut();
        let faulty = w.agents.add("faulty", population::RIDERS, n[0]).unwrap();
        let sleeper = w.agents.add("sleeper", population::RIDERS, n[0]).unwrap();
        w.spawn("faulty", Box::new(Faulty { agent: faulty }));
        w.spawn("sleeper", Box::new(Sleeper { agent: sleeper }));

        let mut sim = b.build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap().clone();

        assert_eq!(outcome(&sim, "faulty"), LeaveOutcome::Error("cabin overflow".into()));
        assert_eq!(outcome(&sim, "sleeper"), LeaveOutcome::Success);
        assert_eq!(times_of(&sim, "sleeper", "leave_simulation"), vec![Tick(50)]);
        assert_eq!(summary.agent_errors, 1);
    }

    #[test]
    fn every_agent_leaves_exactly_once() {
        let (mut b, n) = builder(1_000, &[100]);
        let op = b
            .add_operator("taxi", TransportMode::Car, OperationParameters::default().with_dispatcher("nearest_vehicle"))
            .unwrap();
        b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, n[0], 4)).unwrap();
        b.add_trip_rider("alice", op, TripQuery::new(n[0], n[1]), Tick(0), None).unwrap();

        let mut sim = b.build().unwrap();
        sim.run(&mut NoopObserver).unwrap();

        for name in ["taxi-1", "alice"] {
            let trace = sim.trace_of(name).unwrap();
            assert_eq!(trace.of_kind("leave_simulation").count(), 1, "{name}");
            assert_eq!(trace.of_kind("input").count(), 1, "{name}");
        }
    }

    #[test]
    fn unknown_dispatcher_fails_the_build() {
        let (mut b, _) = builder(1_000, &[100]);
        b.add_operator("taxi", TransportMode::Car, OperationParameters::default().with_dispatcher("teleport"))
            .unwrap();
        assert!(b.build().is_err());
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod params_tests {
    use crate::operator::{Detour, Formula, IdleBehaviour, NeighborStrategy, OperationParameters, Threshold};

    #[test]
    fn formula_evaluates_arithmetic() {
        let f = Formula::parse("2 * direct_travel_time + 300").unwrap();
        assert_eq!(f.max_travel_time(600), Some(1_500));
        let f: Formula = "(direct_travel_time - 100) / 2".parse().unwrap();
        assert_eq!(f.max_travel_time(600), Some(250));
        let f = Formula::parse("-direct_travel_time + 1000").unwrap();
        assert_eq!(f.max_travel_time(400), Some(600));
    }

    #[test]
    fn formula_precedence_and_unary_minus() {
        let f = Formula::parse("100 + direct_travel_time * 2 - 50 / 2").unwrap();
        assert_eq!(f.max_travel_time(300), Some(675));
        let f = Formula::parse("(100 + direct_travel_time) * 2").unwrap();
        assert_eq!(f.max_travel_time(300), Some(800));
        let f = Formula::parse("-(direct_travel_time - 1000) * 2").unwrap();
        assert_eq!(f.max_travel_time(400), Some(1_200));
        let f = Formula::parse("direct_travel_time * 1.5").unwrap();
        assert_eq!(f.max_travel_time(301), Some(452));
    }

    #[test]
    fn negative_result_is_unconstrained() {
        let f = Formula::parse("direct_travel_time - 1000").unwrap();
        assert_eq!(f.max_travel_time(600), None);
    }

    #[test]
    fn division_by_zero() {
        // Constant integer division fails when the operator is built.
        assert!(Formula::parse("direct_travel_time + 1 / 0").is_err());
        // Float division gives an unbounded result, which means no limit.
        let f = Formula::parse("direct_travel_time / 0").unwrap();
        assert_eq!(f.max_travel_time(600), None);
        let f = Formula::parse("1000 / (direct_travel_time - 600)").unwrap();
        assert_eq!(f.max_travel_time(600), None);
        assert_eq!(f.max_travel_time(700), Some(10));
    }

    #[test]
    fn unknown_variables_are_rejected() {
        for source in ["speed + 1", "direct_travel_time * factor", "direct_travel_time = 3"] {
            let err = Formula::parse(source).unwrap_err();
            assert!(err.to_string().contains("invalid formula"), "{source:?}: {err}");
        }
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        for source in ["direct_travel_time *", "(1 + 2", "1 2", "", "\"text\""] {
            assert!(Formula::parse(source).is_err(), "{source:?}");
        }
        assert!(OperationParameters::from_json(r#"{"max_travel_time": "2 *"}"#).is_err());
    }

    #[test]
    fn defaults_from_empty_object() {
        let p = OperationParameters::from_json("{}").unwrap();
        assert_eq!(p.dispatcher, None);
        assert_eq!(p.idle, IdleBehaviour::Indefinite);
        assert_eq!(p.relocation.start_times, vec![25_000]);
        assert_eq!(p.relocation.durations, Some(vec![12_000]));
        assert_eq!(p.relocation.neighbor, NeighborStrategy::Util);
    }

    #[test]
    fn detour_integer_or_float() {
        let p = OperationParameters::from_json(r#"{"max_detour": 300}"#).unwrap();
        assert_eq!(p.max_detour, Some(Detour::Offset(300)));
        assert_eq!(Detour::Offset(300).apply(600), 900);
        let p = OperationParameters::from_json(r#"{"max_detour": 1.5}"#).unwrap();
        assert_eq!(p.max_detour, Some(Detour::Factor(1.5)));
        assert_eq!(Detour::Factor(1.5).apply(600), 900);
    }

    #[test]
    fn negative_detour_is_rejected() {
        for json in [r#"{"max_detour": -300}"#, r#"{"max_detour": -0.5}"#] {
            assert!(OperationParameters::from_json(json).is_err(), "{json}");
        }
        let p = OperationParameters::from_json(r#"{"max_detour": 0}"#).unwrap();
        assert_eq!(p.max_detour, Some(Detour::Offset(0)));
    }

    #[test]
    fn repositioning_keys_are_read() {
        let json = r#"{
            "dispatcher": "pal_zhang",
            "idle": {"timeout": 60},
            "start_times": [100, 200],
            "durations": null,
            "neighbor": "nearest",
            "threshold": {"min": 2, "max": 3}
        }"#;
        let p = OperationParameters::from_json(json).unwrap();
        assert_eq!(p.dispatcher.as_deref(), Some("pal_zhang"));
        assert_eq!(p.idle, IdleBehaviour::Timeout(60));
        assert_eq!(p.relocation.start_times, vec![100, 200]);
        assert_eq!(p.relocation.durations, None);
        assert_eq!(p.relocation.neighbor, NeighborStrategy::Nearest);
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        assert!(OperationParameters::from_json(r#"{"start_times": [200, 100]}"#).is_err());
        assert!(OperationParameters::from_json(r#"{"start_times": [100, 100]}"#).is_err());
        assert!(OperationParameters::from_json(r#"{"start_times": [100], "durations": [1, 2]}"#).is_err());
    }

    #[test]
    fn threshold_fractions_and_units() {
        assert_eq!(Threshold::default().bounds(10), (1, 9));
        assert_eq!(Threshold { min: 2.0, max: 3.0 }.bounds(20), (2, 17));
        assert_eq!(Threshold { min: 0.25, max: 0.5 }.bounds(20), (5, 10));
    }
}

// ── Dispatcher registry ───────────────────────────────────────────────────────

#[cfg(test)]
mod registry_tests {
    use crate::dispatch::{DispatcherEntry, DispatcherRegistry, NearestVehicle, PalZhang};
    use crate::operator::OperationParameters;

    #[test]
    fn builtin_keys() {
        let r = DispatcherRegistry::builtin();
        let keys: Vec<&str> = r.keys().collect();
        assert_eq!(keys, vec![NearestVehicle::KEY, PalZhang::KEY]);
        assert!(r.get("teleport").is_err());
    }

    #[test]
    fn instantiates_by_mode() {
        let r = DispatcherRegistry::default();
        let (online, punctual) = r
            .instantiate(&OperationParameters::default().with_dispatcher(NearestVehicle::KEY))
            .unwrap();
        assert!(online.is_some() && punctual.is_none());

        let (online, punctual) = r.instantiate(&OperationParameters::default().with_dispatcher(PalZhang::KEY)).unwrap();
        assert!(online.is_none());
        assert_eq!(punctual.map(|d| d.name()), Some("PalZhangGCH"));

        let (online, punctual) = r.instantiate(&OperationParameters::default()).unwrap();
        assert!(online.is_none() && punctual.is_none());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut r = DispatcherRegistry::empty();
        let entry = DispatcherEntry { title: "nearest", online: Some(NearestVehicle::factory), punctual: None };
        r.register("mine", entry).unwrap();
        assert!(r.register("mine", entry).is_err());
        assert_eq!(r.keys().count(), 1);
    }
}

// ── Demand ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod demand_tests {
    use ms_core::Tick;

    use crate::dispatch::{load_demand_csv, load_demand_reader, DemandTable};

    #[test]
    fn variation_is_strictly_inside_the_window() {
        let mut t = DemandTable::new();
        t.add("gare", Tick(100), -1);
        t.add("gare", Tick(200), -1);
        t.add("gare", Tick(300), 1);
        assert_eq!(t.variation("gare", Tick(100), Tick(300)), -1);
        assert_eq!(t.variation("gare", Tick(0), Tick(400)), -1);
        assert_eq!(t.variation("gare", Tick(99), Tick(301)), -1);
        assert_eq!(t.variation("mairie", Tick(0), Tick(400)), 0);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn loads_csv_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("demand.csv");
        std::fs::write(&path, "station,time,delta\ngare,25300,-1\nmairie,25900,1\ngare,26000,-1\n").unwrap();
        let t = load_demand_csv(&path).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.variation("gare", Tick(25_000), Tick(30_000)), -2);
        assert_eq!(t.variation("mairie", Tick(25_000), Tick(30_000)), 1);
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(load_demand_reader("station,time,delta\ngare,soon,-1\n".as_bytes()).is_err());
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(load_demand_csv(&dir.path().join("missing.csv")).is_err());
    }
}

// ── Cabin ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod cabin_tests {
    use ms_core::AgentId;

    use crate::vehicle::Cabin;

    #[test]
    fn boarding_respects_seats() {
        let mut c = Cabin::new(3);
        c.board(AgentId(1), 2).unwrap();
        assert!(c.fits(1));
        assert!(!c.fits(2));
        assert!(c.board(AgentId(2), 2).is_err());
        assert_eq!(c.load(), 2);
        c.board(AgentId(3), 1).unwrap();
        assert!(c.is_full());
        assert_eq!(c.last(), Some(AgentId(3)));
        assert_eq!(c.alight(AgentId(1)).map(|o| o.load), Some(2));
        assert_eq!(c.free_seats(), 2);
        assert!(c.alight(AgentId(1)).is_none());
    }
}
