//! `ms-core` — foundational types for the `mobsim` service-dispatch framework.
//!
//! Every other `ms-*` crate depends on this one.  It has no `ms-*`
//! dependencies and only `rand` and `thiserror` externally (plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`ids`]       | `AgentId`, `NodeId`, `VehicleId`, `RequestId`, `TripId`, … |
//! | [`time`]      | `Tick`, `Delay`, `SimConfig`                               |
//! | [`geo`]       | `GeoPoint`, `Zone` (service polygon)                       |
//! | [`rng`]       | `SimRng` (seeded, reproducible)                            |
//! | [`mode`]      | `TransportMode`                                            |
//! | [`error`]     | `CoreError`, `CoreResult`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, time and config.    |

pub mod error;
pub mod geo;
pub mod ids;
pub mod mode;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{GeoPoint, Zone};
pub use ids::{
    AgentId, EventId, NodeId, OperatorId, ProcessId, RequestId, StationId, StopPointId, TripId,
    VehicleId,
};
pub use mode::TransportMode;
pub use rng::SimRng;
pub use time::{Delay, SimConfig, Tick};
