//! Stops executed by service vehicles.

use std::fmt;

use ms_core::{AgentId, NodeId, RequestId, StationId, StopPointId, Tick, TripId};

// ── Legs and references ───────────────────────────────────────────────────────

/// Which half of a trip request a user stop serves.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Leg {
    /// GET stop: the rider boards.
    Pickup,
    /// PUT stop: the rider alights.
    Dropoff,
}

impl Leg {
    #[inline]
    pub fn other(self) -> Leg {
        match self {
            Leg::Pickup  => Leg::Dropoff,
            Leg::Dropoff => Leg::Pickup,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Leg::Pickup  => "GET",
            Leg::Dropoff => "PUT",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on a user stop owned by a `TripRequest` of the same operator.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct UserStopRef {
    pub request: RequestId,
    pub leg:     Leg,
}

impl UserStopRef {
    #[inline]
    pub fn pickup(request: RequestId) -> Self {
        Self { request, leg: Leg::Pickup }
    }

    #[inline]
    pub fn dropoff(request: RequestId) -> Self {
        Self { request, leg: Leg::Dropoff }
    }

    /// The other stop of the same request.
    #[inline]
    pub fn twin(self) -> Self {
        Self { request: self.request, leg: self.leg.other() }
    }
}

impl fmt::Display for UserStopRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.request, self.leg)
    }
}

// ── Times ─────────────────────────────────────────────────────────────────────

/// Planned and effective arrival/departure of a stop.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct StopTimes {
    pub arrival:             Option<Tick>,
    pub departure:           Option<Tick>,
    pub effective_arrival:   Option<Tick>,
    pub effective_departure: Option<Tick>,
}

impl StopTimes {
    pub fn planned(arrival: Tick, departure: Tick) -> Self {
        Self { arrival: Some(arrival), departure: Some(departure), ..Self::default() }
    }

    /// Effective arrival once known, planned arrival before.
    #[inline]
    pub fn best_arrival(&self) -> Option<Tick> {
        self.effective_arrival.or(self.arrival)
    }

    #[inline]
    pub fn best_departure(&self) -> Option<Tick> {
        self.effective_departure.or(self.departure)
    }
}

// ── UserStop ──────────────────────────────────────────────────────────────────

/// A rider's pickup or dropoff.
#[derive(Clone, Debug, PartialEq)]
pub struct UserStop {
    pub leg:             Leg,
    pub position:        NodeId,
    pub request:         RequestId,
    /// Set by [`TripRequest::set_stops`](crate::TripRequest::set_stops).
    pub twin:            Option<UserStopRef>,
    /// Stop point grouping this stop, if any.
    pub stop_point:      Option<StopPointId>,
    /// Trip allowed to serve the stop.  `None` matches every trip.
    pub trip:            Option<TripId>,
    /// Earliest acceptable service time.
    pub requested_time:  Option<Tick>,
    /// Latest acceptable service time.
    pub max_time:        Option<Tick>,
    /// Cap on the pickup-to-dropoff duration.
    pub max_travel_time: Option<u64>,
    pub times:           StopTimes,
}

impl UserStop {
    pub fn new(leg: Leg, position: NodeId, request: RequestId) -> Self {
        Self {
            leg,
            position,
            request,
            twin:            None,
            stop_point:      None,
            trip:            None,
            requested_time:  None,
            max_time:        None,
            max_travel_time: None,
            times:           StopTimes::default(),
        }
    }

    pub fn with_window(mut self, requested_time: Option<Tick>, max_time: Option<Tick>) -> Self {
        self.requested_time = requested_time;
        self.max_time = max_time;
        self
    }

    pub fn at_stop_point(mut self, stop_point: StopPointId) -> Self {
        self.stop_point = Some(stop_point);
        self
    }

    #[inline]
    pub fn handle(&self) -> UserStopRef {
        UserStopRef { request: self.request, leg: self.leg }
    }

    /// Planned processing time: departure for a pickup, arrival for a dropoff.
    pub fn process_time(&self) -> Option<Tick> {
        match self.leg {
            Leg::Pickup  => self.times.departure,
            Leg::Dropoff => self.times.arrival,
        }
    }

    /// Actual service time when known, planned otherwise.
    pub fn service_time(&self) -> Option<Tick> {
        match self.leg {
            Leg::Pickup  => self.times.best_departure(),
            Leg::Dropoff => self.times.best_arrival(),
        }
    }

    /// Check the three time constraints against the service time.
    ///
    /// A stop that has no known service time is not feasible.  The travel
    /// time constraint is only checked once both ends are timed.
    pub fn is_feasible(&self, twin: &UserStop) -> bool {
        let Some(service) = self.service_time() else {
            return false;
        };

        let travel_time = match self.leg {
            Leg::Pickup  => twin.times.best_arrival().map(|arr| arr.signed_since(service)),
            Leg::Dropoff => twin.times.best_departure().map(|dep| service.signed_since(dep)),
        };

        let after_requested = self.requested_time.is_none_or(|t| t <= service);
        let before_max = self.max_time.is_none_or(|t| service <= t);
        let not_too_long = match (self.max_travel_time, travel_time) {
            (Some(max), Some(travel)) => travel <= max as i64,
            _ => true,
        };
        after_requested && before_max && not_too_long
    }
}

// ── Operation ─────────────────────────────────────────────────────────────────

/// A repositioning instruction: move `|total|` units between the vehicle and
/// a station.  Negative totals take units from the station.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub position: NodeId,
    pub total:    i64,
    pub targets:  Vec<AgentId>,
    pub station:  Option<StationId>,
    pub times:    StopTimes,
}

impl Operation {
    pub fn new(position: NodeId, total: i64, station: Option<StationId>) -> Self {
        Self { position, total, targets: Vec::new(), station, times: StopTimes::default() }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[total={}, position={}", self.total, self.position)?;
        if let Some(station) = self.station {
            write!(f, ", station={station}")?;
        }
        f.write_str("]")
    }
}

// ── Stop ──────────────────────────────────────────────────────────────────────

/// One element of a vehicle planning.
#[derive(Clone, Debug, PartialEq)]
pub enum Stop {
    /// A single pickup or dropoff.  `position` mirrors the user stop's.
    User { stop: UserStopRef, position: NodeId },
    /// Visit of a shared stop point of the operator.
    Point { id: StopPointId, position: NodeId },
    Operation(Operation),
    /// No-op stop (depot, end of a repositioning tour).  Removed on arrival.
    Marker { position: NodeId, point: Option<StopPointId> },
}

impl Stop {
    pub fn user(stop: &UserStop) -> Self {
        Stop::User { stop: stop.handle(), position: stop.position }
    }

    pub fn position(&self) -> NodeId {
        match self {
            Stop::User { position, .. }
            | Stop::Point { position, .. }
            | Stop::Marker { position, .. } => *position,
            Stop::Operation(op) => op.position,
        }
    }

    /// The user stop this entry refers to, if it is one.
    pub fn user_ref(&self) -> Option<UserStopRef> {
        match self {
            Stop::User { stop, .. } => Some(*stop),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stop::User { stop, .. } => stop.leg.as_str(),
            Stop::Point { .. }      => "STOP_POINT",
            Stop::Operation(_)      => "REPOSITIONING",
            Stop::Marker { .. }     => "NONE",
        }
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stop::User { stop, position }  => write!(f, "{stop}@{position}"),
            Stop::Point { id, position }   => write!(f, "stop point {id}@{position}"),
            Stop::Operation(op)            => write!(f, "operation {op}"),
            Stop::Marker { position, .. }  => write!(f, "marker@{position}"),
        }
    }
}
