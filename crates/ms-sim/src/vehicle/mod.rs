//! Service vehicles: capability structs, stop policies and their processes.
//!
//! A vehicle is assembled from small parts instead of a type hierarchy:
//!
//! | Part          | Role                                                   |
//! |---------------|--------------------------------------------------------|
//! | [`Body`]      | position and travel mode                               |
//! | [`Cabin`]     | seats and occupants (riders or stock units)            |
//! | [`Itinerary`] | planning, trip, idle signal                            |
//! | [`StopPolicy`]| behavioural hooks: which stops to serve, dwell, refusal|
//!
//! The processes in [`runner`] walk the itinerary; [`stop_task`] executes one
//! stop; [`service`] holds the pickup and dropoff transitions.

pub mod policy;
pub mod runner;
pub mod service;
pub mod stop_task;

use std::rc::Rc;

use ms_core::{AgentId, EventId, NodeId, OperatorId, ProcessId, TransportMode, TripId, VehicleId};
use ms_model::{Planning, Stop};
use ms_sched::Payload;

use crate::{SimError, SimResult, World};

pub use policy::{DefaultStops, RepositioningStops, StopPolicy, TimetabledStops};
pub use runner::{FleetRunner, TimetableRunner};

/// Default time spent at a stop, in seconds.
pub const DEFAULT_DWELL_TIME: u64 = 30;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VehicleKind {
    /// Serves user stops on demand.
    OnDemand,
    /// Repositions station stock.
    Staff,
    /// Runs timetabled trips between stop points.
    Timetabled,
}

/// Route and direction a timetabled trip belongs to.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RouteKey {
    pub route:     String,
    pub direction: u8,
}

// ── Capabilities ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Body {
    pub agent:    AgentId,
    pub position: NodeId,
    pub mode:     TransportMode,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Occupant {
    pub agent: AgentId,
    /// Seats taken by the agent's group.
    pub load:  u32,
}

#[derive(Clone, Debug)]
pub struct Cabin {
    pub seats:     u32,
    pub occupants: Vec<Occupant>,
}

impl Cabin {
    pub fn new(seats: u32) -> Self {
        Self { seats, occupants: Vec::new() }
    }

    pub fn load(&self) -> u32 {
        self.occupants.iter().map(|o| o.load).sum()
    }

    pub fn free_seats(&self) -> u32 {
        self.seats.saturating_sub(self.load())
    }

    /// `true` if a group of `load` more seats fits.
    #[inline]
    pub fn fits(&self, load: u32) -> bool {
        self.load() + load <= self.seats
    }

    pub fn is_full(&self) -> bool {
        self.load() >= self.seats
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.occupants.iter().any(|o| o.agent == agent)
    }

    /// Last agent who boarded.
    pub fn last(&self) -> Option<AgentId> {
        self.occupants.last().map(|o| o.agent)
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.occupants.iter().map(|o| o.agent).collect()
    }

    pub fn board(&mut self, agent: AgentId, load: u32) -> SimResult<()> {
        if !self.fits(load) {
            return Err(SimError::logic(format!(
                "{agent} boarding with {load} seats exceeds capacity {} (load {})",
                self.seats,
                self.load()
            )));
        }
        self.occupants.push(Occupant { agent, load });
        Ok(())
    }

    pub fn alight(&mut self, agent: AgentId) -> Option<Occupant> {
        let i = self.occupants.iter().position(|o| o.agent == agent)?;
        Some(self.occupants.remove(i))
    }
}

#[derive(Clone, Debug)]
pub struct Itinerary {
    pub planning:         Planning,
    /// Trip currently run.
    pub trip:             Option<TripId>,
    /// Trips run one after the other by a timetabled vehicle.
    pub trip_list:        Vec<TripId>,
    pub route:            Option<RouteKey>,
    /// Position the vehicle is heading to.
    pub temp_destination: Option<NodeId>,
    pub dwell_time:       u64,
    pub is_idle:          bool,
    /// Waiting for the planned arrival time of the planning head.
    pub holding:          bool,
    /// Wakes the vehicle out of its idle wait.
    pub signal:           EventId,
}

// ── ServiceVehicle ────────────────────────────────────────────────────────────

pub struct ServiceVehicle {
    pub id:        VehicleId,
    pub name:      String,
    pub kind:      VehicleKind,
    pub operator:  OperatorId,
    pub body:      Body,
    pub cabin:     Cabin,
    pub itinerary: Itinerary,
    pub policy:    Rc<dyn StopPolicy>,
    pub process:   ProcessId,
}

impl ServiceVehicle {
    #[inline]
    pub fn agent(&self) -> AgentId {
        self.body.agent
    }

    pub fn planning(&self) -> &[Stop] {
        &self.itinerary.planning
    }
}

impl std::fmt::Display for ServiceVehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ── Planning updates ──────────────────────────────────────────────────────────

impl World {
    /// Replace the planning of `vehicle` and wake it.
    ///
    /// An idle vehicle is woken through its signal event, unless the new
    /// planning is empty; a vehicle holding for a planned arrival is
    /// interrupted so it re-reads the new head.
    pub fn set_planning(&mut self, vehicle: VehicleId, planning: Planning) -> SimResult<()> {
        let v = self.vehicle_mut(vehicle)?;
        v.itinerary.temp_destination = planning.first().map(Stop::position);
        let empty = planning.is_empty();
        v.itinerary.planning = planning;
        let (idle, holding, process) = (v.itinerary.is_idle, v.itinerary.holding, v.process);

        if idle {
            if !empty {
                self.trigger_signal(vehicle)?;
            }
        } else if holding && self.sched.is_alive(process) {
            self.sched.interrupt(process, "planning changed")?;
        }
        Ok(())
    }

    /// Fire the vehicle's signal and arm a fresh one.
    pub(crate) fn trigger_signal(&mut self, vehicle: VehicleId) -> SimResult<()> {
        let fresh = self.sched.new_event();
        let v = self.vehicle_mut(vehicle)?;
        let former = std::mem::replace(&mut v.itinerary.signal, fresh);
        if self.sched.is_pending(former) {
            self.sched.succeed(former, Payload::Empty)?;
        }
        Ok(())
    }
}
