//! Trace event records.

use ms_core::{AgentId, NodeId, RequestId, Tick, TripId};

use crate::LeaveOutcome;

/// One entry of an agent trace.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TraceEvent {
    pub time: Tick,
    pub kind: EventKind,
}

impl TraceEvent {
    #[inline]
    pub fn new(time: Tick, kind: EventKind) -> Self {
        Self { time, kind }
    }
}

/// Snapshot of a request at the moment it was traced.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RequestRecord {
    /// Operator-scoped id; station requests have none.
    pub id:            Option<RequestId>,
    pub agent:         AgentId,
    /// Agent of the operator or station the request was made to.
    pub structure:     AgentId,
    /// `"GET"`, `"PUT"` or `"TAXI"`.
    pub kind:          &'static str,
    pub success:       Option<bool>,
    /// Waits and detours recorded so far, in seconds.
    pub wait_sequence: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EventKind {
    /// The agent entered the simulation at `position`.
    Input { position: NodeId },

    Move {
        from:      NodeId,
        to:        NodeId,
        duration:  u64,
        path:      Vec<NodeId>,
        /// Agents carried during the move.
        occupants: Vec<AgentId>,
    },

    /// Generic wait, e.g. a vehicle holding until a planned arrival time.
    Wait { duration: u64 },

    /// An idle period of a service vehicle, traced once it is woken.
    Idle { duration: u64 },

    Request(RequestRecord),

    /// A stop processed by a service vehicle.  Riders whose requests were
    /// served get a copy in their own trace.
    Stop {
        operator:     AgentId,
        vehicle:      AgentId,
        trip:         Option<TripId>,
        position:     NodeId,
        dropoffs:     Vec<RequestId>,
        dropoff_time: Tick,
        pickups:      Vec<RequestId>,
        pickup_time:  Tick,
    },

    GetVehicle { vehicle: AgentId },

    LeaveVehicle { vehicle: AgentId },

    /// A repositioning operation: `total` units actually moved out of a
    /// `goal` (negative = taken from the station).
    StaffOperation {
        staff:     AgentId,
        total:     i64,
        goal:      i64,
        targets:   Vec<AgentId>,
        structure: Option<AgentId>,
    },

    DestinationReached { position: NodeId },

    LeaveSimulation { outcome: LeaveOutcome },
}

impl EventKind {
    /// Short tag, handy for filtering and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Input { .. }              => "input",
            EventKind::Move { .. }               => "move",
            EventKind::Wait { .. }               => "wait",
            EventKind::Idle { .. }               => "idle",
            EventKind::Request(_)                => "request",
            EventKind::Stop { .. }               => "stop",
            EventKind::GetVehicle { .. }         => "get_vehicle",
            EventKind::LeaveVehicle { .. }       => "leave_vehicle",
            EventKind::StaffOperation { .. }     => "staff_operation",
            EventKind::DestinationReached { .. } => "destination_reached",
            EventKind::LeaveSimulation { .. }    => "leave_simulation",
        }
    }
}
