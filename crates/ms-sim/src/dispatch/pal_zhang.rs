//! Greedy construction heuristic for station repositioning.
//!
//! At each start time the heuristic plans one tour of the first staff
//! vehicle of the operator:
//!
//! 1. Each station gets a target stock: its current stock corrected by the
//!    demand expected before the next start time, clamped into the band
//!    given by [`Threshold`](crate::operator::Threshold).  When the band is
//!    too narrow for the expected variation, the prioritised bound wins.
//! 2. From the depot, the vehicle repeatedly moves to the neighbour chosen
//!    by the [`NeighborStrategy`] and takes or drops as many units as both
//!    the station need and its own load allow.
//! 3. The tour stops once no station can be corrected or the next visit
//!    would end after the tour duration.  In the latter case the remaining
//!    needs are traced on the staff vehicle as failed operations.
//!
//! The tour is framed by depot markers.

use std::collections::BTreeMap;

use ms_core::{AgentId, NodeId, OperatorId, StationId, StopPointId, Tick, VehicleId};
use ms_model::{Operation, Planning, Stop, StopTimes};
use ms_trace::EventKind;

use crate::dispatch::Dispatcher;
use crate::operator::{NeighborStrategy, OperationParameters, PalZhangParams, PriorityThreshold};
use crate::{SimError, SimResult, World};

pub struct PalZhang {
    params: PalZhangParams,
    tour:   Option<Tour>,
}

/// State of the tour being built.
struct Tour {
    vehicle:      VehicleId,
    staff:        AgentId,
    capacity:     i64,
    dwell_time:   u64,
    depot:        NodeId,
    depot_point:  Option<StopPointId>,
    /// `None` at the depot.
    current:      Option<StationId>,
    position:     NodeId,
    time:         Tick,
    time_limit:   Option<Tick>,
    /// Signed number of units each station should receive.
    needed:       BTreeMap<StationId, i64>,
    planning:     Planning,
}

impl Tour {
    fn push_depot(&mut self) {
        self.planning.push(Stop::Marker { position: self.depot, point: self.depot_point.clone() });
    }

    /// Units carried once the planned operations are done.
    fn load(&self) -> i64 {
        -self
            .planning
            .iter()
            .filter_map(|s| match s {
                Stop::Operation(op) => Some(op.total),
                _ => None,
            })
            .sum::<i64>()
    }

    /// Largest operation feasible at each station given the vehicle load.
    fn maximum_operations(&self) -> BTreeMap<StationId, i64> {
        let load = self.load();
        self.needed
            .iter()
            .map(|(&station, &need)| {
                let max = match need {
                    n if n > 0 => n.min(load),
                    n if n < 0 => n.max(load - self.capacity),
                    _ => 0,
                };
                (station, max)
            })
            .collect()
    }
}

impl PalZhang {
    pub const KEY: &'static str = "pal_zhang";

    pub fn new(params: PalZhangParams) -> Self {
        Self { params, tour: None }
    }

    pub fn factory(params: &OperationParameters) -> SimResult<Box<dyn Dispatcher>> {
        Ok(Box::new(PalZhang::new(params.relocation.clone())))
    }

    fn tour(&mut self) -> SimResult<&mut Tour> {
        self.tour.as_mut().ok_or_else(|| SimError::logic("repositioning tour used before setup"))
    }

    /// Stock the station should hold at the start of the tour.
    fn target_stock(&self, stock: i64, capacity: usize, variation: i64) -> i64 {
        let (low, high) = self.params.threshold.bounds(capacity);
        let outrange = variation > high - low;
        let target = stock - variation;
        if target < low {
            if outrange && self.params.priority_threshold == PriorityThreshold::Max {
                (high - variation).max(0)
            } else {
                low
            }
        } else if target > high {
            if outrange && self.params.priority_threshold == PriorityThreshold::Min {
                (low + variation).min(capacity as i64)
            } else {
                high
            }
        } else {
            target
        }
    }

    fn select_neighbor(
        &self,
        world:      &mut World,
        candidates: &[(StationId, NodeId, u64)],
        max_ops:    &BTreeMap<StationId, i64>,
    ) -> Option<(StationId, NodeId, u64)> {
        match self.params.neighbor {
            NeighborStrategy::Nearest => candidates.iter().copied().min_by_key(|&(_, _, secs)| secs),
            NeighborStrategy::Random  => world.rng.choose(candidates).copied(),
            NeighborStrategy::Util    => {
                let utility = |&(station, _, secs): &(StationId, NodeId, u64)| {
                    let ops = max_ops.get(&station).copied().unwrap_or(0).unsigned_abs() as f64;
                    ops / secs.max(1) as f64
                };
                let mut best: Option<((StationId, NodeId, u64), f64)> = None;
                for candidate in candidates {
                    let u = utility(candidate);
                    if best.is_none_or(|(_, b)| u > b) {
                        best = Some((*candidate, u));
                    }
                }
                best.map(|(c, _)| c)
            }
        }
    }

    /// Trace the needs left unmet when the tour ran out of time.
    fn record_failed_operations(world: &mut World, tour: &Tour) -> SimResult<()> {
        let failed_get: i64 = tour.needed.values().filter(|&&n| n < 0).map(|n| -n).sum();
        let failed_put: i64 = tour.needed.values().filter(|&&n| n > 0).sum();
        for goal in [-failed_get, failed_put] {
            world.trace(tour.staff, EventKind::StaffOperation {
                staff:     tour.staff,
                total:     0,
                goal,
                targets:   Vec::new(),
                structure: None,
            })?;
        }
        Ok(())
    }
}

impl Dispatcher for PalZhang {
    fn name(&self) -> &'static str {
        "PalZhangGCH"
    }

    fn next_dispatch(&self, after: Option<Tick>) -> Option<Tick> {
        self.params
            .start_times
            .iter()
            .map(|&t| Tick(t))
            .find(|&t| after.is_none_or(|a| t > a))
    }

    fn setup_dispatch(&mut self, world: &mut World, operator: OperatorId) -> SimResult<()> {
        let now = world.now();
        let index = self
            .params
            .start_times
            .iter()
            .position(|&t| Tick(t) == now)
            .ok_or_else(|| SimError::config(format!("no repositioning start time at {now}")))?;
        let time_limit = match &self.params.durations {
            Some(durations) => {
                let duration = durations.get(index).ok_or_else(|| {
                    SimError::config(format!("no repositioning duration for start time {now}"))
                })?;
                Some(now + *duration)
            }
            None => None,
        };
        let horizon = self.params.start_times.get(index + 1).map_or(world.config.end_tick(), |&t| Tick(t));

        let op = world.operator(operator)?;
        let vehicle = *op
            .staff
            .first()
            .ok_or_else(|| SimError::config(format!("{op} has no staff vehicle to reposition with")))?;
        let v = world.vehicle(vehicle)?;
        let (depot, depot_point) = match op.depot_points.values().next() {
            Some(point) => (point.position, Some(point.id.clone())),
            None => {
                log::warn!("{op} has no depot, {v} starts its tour where it stands");
                (v.body.position, None)
            }
        };

        let mut needed = BTreeMap::new();
        for &sid in &op.stations {
            let station = world.station(sid)?;
            let variation = op.demand.variation(&station.name, now, horizon);
            let stock = station.stock() as i64;
            let target = self.target_stock(stock, station.capacity(), variation);
            log::debug!("{station} variation={variation} target={target}");
            needed.insert(sid, target - stock);
        }

        let mut tour = Tour {
            vehicle,
            staff:       v.agent(),
            capacity:    i64::from(v.cabin.seats),
            dwell_time:  v.itinerary.dwell_time,
            depot,
            depot_point,
            current:     None,
            position:    depot,
            time:        now,
            time_limit,
            needed,
            planning:    Planning::new(),
        };
        tour.push_depot();
        self.tour = Some(tour);
        Ok(())
    }

    fn run_algorithm(&mut self, world: &mut World, operator: OperatorId) -> SimResult<()> {
        log::info!("{} starts {}", world.operator(operator)?, self.name());
        let Some(mut tour) = self.tour.take() else {
            return Err(SimError::logic("repositioning tour used before setup"));
        };

        loop {
            let max_ops = tour.maximum_operations();
            let mut candidates = Vec::new();
            for (&sid, &max) in &max_ops {
                if max == 0 || Some(sid) == tour.current {
                    continue;
                }
                let position = world.station(sid)?.position;
                match world.travel_time(tour.position, position) {
                    Ok(secs) => candidates.push((sid, position, secs)),
                    Err(e) => log::warn!("station {sid} is unreachable from {}: {e}", tour.position),
                }
            }
            let Some((next, position, travel)) = self.select_neighbor(world, &candidates, &max_ops) else {
                break;
            };

            let arrival = tour.time + travel;
            let end = arrival + tour.dwell_time;
            if tour.time_limit.is_some_and(|limit| end > limit) {
                log::info!("repositioning tour ends on its duration limit at {}", tour.time);
                Self::record_failed_operations(world, &tour)?;
                break;
            }

            let total = max_ops.get(&next).copied().unwrap_or(0);
            let mut operation = Operation::new(position, total, Some(next));
            operation.times = StopTimes::planned(arrival, end);
            log::debug!("new operation {operation}");
            tour.planning.push(Stop::Operation(operation));
            if let Some(need) = tour.needed.get_mut(&next) {
                *need -= total;
            }
            tour.time = end;
            tour.current = Some(next);
            tour.position = position;
        }

        tour.push_depot();
        self.tour = Some(tour);
        Ok(())
    }

    fn update_from_solution(&mut self, world: &mut World, _operator: OperatorId) -> SimResult<()> {
        let tour = self.tour()?;
        let vehicle = tour.vehicle;
        let planning = std::mem::take(&mut tour.planning);
        log::info!("repositioning planning of {} has {} stops", world.vehicle(vehicle)?, planning.len());
        self.tour = None;
        world.set_planning(vehicle, planning)
    }
}
