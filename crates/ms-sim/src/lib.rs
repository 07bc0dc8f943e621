//! `ms-sim` — agent processes, service vehicles, operators and dispatchers.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`world`]      | `World`: entity arenas, scheduler, topology, traces          |
//! | [`process`]    | `Process` trait and `Step`                                   |
//! | [`vehicle`]    | `ServiceVehicle`, stop policies, fleet and timetable runners |
//! | [`operator`]   | `Operator`, request lifecycle, operation parameters          |
//! | [`dispatch`]   | `Dispatcher` trait, registry, nearest-vehicle and PalZhang   |
//! | [`rider`]      | `TripRider`, `StationRider`                                  |
//! | [`station`]    | `Station`: bounded stock of shared units                     |
//! | [`sim`]        | `Sim` run loop                                               |
//! | [`builder`]    | `SimBuilder`, `VehicleSpec`                                  |
//!
//! # Run loop
//!
//! ```text
//! while let Some((process, wake)) = scheduler.next():
//!   take the process out of its slot
//!   step = process.resume(world, wake)
//!   Wait(w)  → put it back, scheduler.suspend(process, w)
//!   Exit(o)  → scheduler.finish(process), agent leaves with o
//!   Logic(e) → agent leaves with Error(e), the run goes on
//! at the limit: every agent still running leaves with END_OF_SIMULATION
//! ```
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ms_core::{NodeId, SimConfig, Tick, TransportMode};
//! use ms_sim::operator::{OperationParameters, TripQuery};
//! use ms_sim::vehicle::VehicleKind;
//! use ms_sim::{NoopObserver, SimBuilder, VehicleSpec};
//!
//! let mut b = SimBuilder::new(SimConfig::new(86_400, 42), Box::new(network))?;
//! let params = OperationParameters::default().with_dispatcher("nearest_vehicle");
//! let op = b.add_operator("taxi", TransportMode::Car, params)?;
//! b.add_vehicle(VehicleSpec::new("taxi-1", op, VehicleKind::OnDemand, NodeId(0), 4))?;
//! b.add_trip_rider("alice", op, TripQuery::new(NodeId(3), NodeId(9)), Tick(600), Some(900))?;
//! let summary = b.build()?.run(&mut NoopObserver)?.clone();
//! ```

pub mod agents;
pub mod builder;
pub mod dispatch;
pub mod error;
pub mod observer;
pub mod operator;
pub mod process;
pub mod rider;
pub mod sim;
pub mod station;
pub mod vehicle;
pub mod world;

#[cfg(test)]
mod tests;

pub use agents::{AgentRecord, AgentRegistry};
pub use builder::{SimBuilder, VehicleSpec};
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
pub use operator::Operator;
pub use process::{Process, Step};
pub use rider::{StationRider, TripRider};
pub use sim::Sim;
pub use station::Station;
pub use vehicle::ServiceVehicle;
pub use world::World;
