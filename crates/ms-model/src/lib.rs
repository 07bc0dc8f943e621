//! `ms-model` — the request/stop data model.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                    |
//! |-----------------|-------------------------------------------------------------|
//! | [`request`]     | `Request`, `TripRequest`, `RequestKind`, `Structure`        |
//! | [`stop`]        | `Stop`, `UserStop`, `UserStopRef`, `Leg`, `Operation`       |
//! | [`stop_point`]  | `StopPoint`: shared pickup/dropoff queues + per-trip times  |
//! | [`planning`]    | `Planning` helpers (purge, position lookup)                 |
//! | [`error`]       | `ModelError`, `ModelResult<T>`                              |
//!
//! # Ownership
//!
//! A `UserStop` is owned by its `TripRequest`.  Plannings and stop points
//! hold [`UserStopRef`]s (request id + leg) and resolve them through the
//! operator's request ledger, so the same stop can appear in a planning and
//! a stop-point queue without shared mutable state.

pub mod error;
pub mod planning;
pub mod request;
pub mod stop;
pub mod stop_point;


pub use error::{ModelError, ModelResult};
pub use planning::Planning;
pub use request::{Request, RequestKind, RequestResult, RequestStatus, Structure, TripRequest};
pub use stop::{Leg, Operation, Stop, StopTimes, UserStop, UserStopRef};
pub use stop_point::StopPoint;
