//! Requests made by agents to operators and stations.

use std::fmt;

use ms_core::{AgentId, EventId, OperatorId, RequestId, StationId, Tick, TripId, VehicleId};
use ms_sched::{Payload, Scheduler};

use crate::{Leg, ModelError, ModelResult, UserStop, UserStopRef};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RequestKind {
    Get,
    Put,
    Taxi,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Get  => "GET",
            RequestKind::Put  => "PUT",
            RequestKind::Taxi => "TAXI",
        }
    }
}

/// Structure a request is addressed to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Structure {
    Operator(OperatorId),
    Station(StationId),
}

/// What a successful request handed over.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RequestResult {
    /// The service vehicle that picked the rider up.
    Vehicle(VehicleId),
    /// A stock unit taken from a station.
    Unit(AgentId),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RequestStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A rider's ask to a structure.
///
/// The completion event is single-use: [`succeed`](Self::succeed) and
/// [`fail`](Self::fail) swap in a fresh event before resolving the former
/// one, so a later resolution never touches an event somebody already saw
/// fire.
#[derive(Clone, Debug)]
pub struct Request {
    pub agent:         AgentId,
    pub timestamp:     Tick,
    pub structure:     Structure,
    pub kind:          RequestKind,
    event:             EventId,
    /// `None` while pending.
    pub success:       Option<bool>,
    pub result:        Option<RequestResult>,
    /// Waits and detours, in seconds.
    pub wait_sequence: Vec<i64>,
    pub cancelled:     bool,
}

impl Request {
    pub fn new(sched: &mut Scheduler, agent: AgentId, structure: Structure, kind: RequestKind) -> Self {
        Self {
            agent,
            timestamp:     sched.now(),
            structure,
            kind,
            event:         sched.new_event(),
            success:       None,
            result:        None,
            wait_sequence: Vec::new(),
            cancelled:     false,
        }
    }

    /// The event the next resolution will fire.
    #[inline]
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Adopt an externally created event, e.g. a store get.
    pub fn set_event(&mut self, event: EventId) {
        self.event = event;
    }

    pub fn succeed(&mut self, sched: &mut Scheduler) -> ModelResult<()> {
        let former = std::mem::replace(&mut self.event, sched.new_event());
        sched.succeed(former, Payload::Empty)?;
        Ok(())
    }

    pub fn fail(&mut self, sched: &mut Scheduler) -> ModelResult<()> {
        let former = std::mem::replace(&mut self.event, sched.new_event());
        sched.fail(former)?;
        Ok(())
    }

    pub fn status(&self) -> RequestStatus {
        if self.cancelled {
            return RequestStatus::Cancelled;
        }
        match self.success {
            None        => RequestStatus::Pending,
            Some(true)  => RequestStatus::Succeeded,
            Some(false) => RequestStatus::Failed,
        }
    }

    /// `true` once the request is failed or cancelled.
    #[inline]
    pub fn is_dismissed(&self) -> bool {
        self.cancelled || self.success == Some(false)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[requestTime={}, agent={}, type={}, success={:?}, waits={:?}]",
            self.timestamp, self.agent, self.kind.as_str(), self.success, self.wait_sequence
        )
    }
}

// ── TripRequest ───────────────────────────────────────────────────────────────

/// A request for a ride with an operator's service.
///
/// Carries its two user stops and one event per leg, so the rider can wait
/// for the pickup and the dropoff independently.
#[derive(Clone, Debug)]
pub struct TripRequest {
    pub id:                 RequestId,
    pub request:            Request,
    pub trip:               Option<TripId>,
    pub seats:              u32,
    /// Baseline for the detour KPI, in seconds.
    pub direct_travel_time: Option<u64>,
    pub pickup:             Option<UserStop>,
    pub dropoff:            Option<UserStop>,
    pub pickup_event:       EventId,
    pub dropoff_event:      EventId,
}

impl TripRequest {
    pub fn new(sched: &mut Scheduler, id: RequestId, agent: AgentId, operator: OperatorId, seats: u32) -> Self {
        let request = Request::new(sched, agent, Structure::Operator(operator), RequestKind::Taxi);
        Self {
            id,
            request,
            trip:               None,
            seats,
            direct_travel_time: None,
            pickup:             None,
            dropoff:            None,
            pickup_event:       sched.new_event(),
            dropoff_event:      sched.new_event(),
        }
    }

    /// Install the pickup and dropoff stops and make them twins.
    pub fn set_stops(&mut self, mut pickup: UserStop, mut dropoff: UserStop) -> ModelResult<()> {
        if pickup.leg != Leg::Pickup {
            return Err(ModelError::WrongLeg { expected: Leg::Pickup, found: pickup.leg });
        }
        if dropoff.leg != Leg::Dropoff {
            return Err(ModelError::WrongLeg { expected: Leg::Dropoff, found: dropoff.leg });
        }
        pickup.request = self.id;
        dropoff.request = self.id;
        pickup.twin = Some(dropoff.handle());
        dropoff.twin = Some(pickup.handle());
        self.pickup = Some(pickup);
        self.dropoff = Some(dropoff);
        Ok(())
    }

    /// Bind the request and both its stops to `trip`.
    pub fn set_trip(&mut self, trip: Option<TripId>) {
        for stop in [self.pickup.as_mut(), self.dropoff.as_mut()].into_iter().flatten() {
            stop.trip = trip.clone();
        }
        self.trip = trip;
    }

    pub fn stop(&self, leg: Leg) -> ModelResult<&UserStop> {
        let stop = match leg {
            Leg::Pickup  => self.pickup.as_ref(),
            Leg::Dropoff => self.dropoff.as_ref(),
        };
        stop.ok_or(ModelError::MissingStop { request: self.id, leg })
    }

    pub fn stop_mut(&mut self, leg: Leg) -> ModelResult<&mut UserStop> {
        let id = self.id;
        let stop = match leg {
            Leg::Pickup  => self.pickup.as_mut(),
            Leg::Dropoff => self.dropoff.as_mut(),
        };
        stop.ok_or(ModelError::MissingStop { request: id, leg })
    }

    pub fn stop_ref(&self, leg: Leg) -> UserStopRef {
        UserStopRef { request: self.id, leg }
    }

    /// Event fired when `leg` is processed.
    pub fn leg_event(&self, leg: Leg) -> EventId {
        match leg {
            Leg::Pickup  => self.pickup_event,
            Leg::Dropoff => self.dropoff_event,
        }
    }

    /// Feasibility of one leg against its twin.
    pub fn is_feasible(&self, leg: Leg) -> bool {
        match (self.stop(leg), self.stop(leg.other())) {
            (Ok(stop), Ok(twin)) => stop.is_feasible(twin),
            _ => false,
        }
    }

    /// `(dropoff arrival - pickup departure) - direct travel time`, using
    /// effective times.
    pub fn detour(&self) -> Option<i64> {
        let direct = self.direct_travel_time?;
        let pickup = self.pickup.as_ref()?.times.effective_departure?;
        let dropoff = self.dropoff.as_ref()?.times.effective_arrival?;
        Some(dropoff.signed_since(pickup) - direct as i64)
    }

    #[inline]
    pub fn agent(&self) -> AgentId {
        self.request.agent
    }

    #[inline]
    pub fn status(&self) -> RequestStatus {
        self.request.status()
    }
}
