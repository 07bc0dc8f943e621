//! `ms-spatial` — the narrow topology interface the engine routes through.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`topology`] | `Topology` trait, `CostDimension`                          |
//! | [`network`]  | `RoadNetwork` (CSR + R-tree), `RoadNetworkBuilder`         |
//! | [`router`]   | Dijkstra over either cost dimension                        |
//! | [`error`]    | `SpatialError`, `SpatialResult<T>`                         |
//!
//! The engine only ever talks to `dyn Topology`.  `RoadNetwork` is a small
//! in-memory implementation for tests and hand-built scenarios; production
//! graphs (OSM imports, speed models) plug in behind the same trait.

pub mod error;
pub mod network;
pub mod router;
pub mod topology;


pub use error::{SpatialError, SpatialResult};
pub use network::{RoadNetwork, RoadNetworkBuilder};
pub use topology::{CostDimension, Topology};
