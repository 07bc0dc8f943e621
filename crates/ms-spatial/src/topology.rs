//! The `Topology` trait.

use ms_core::{GeoPoint, NodeId, TransportMode};

use crate::SpatialResult;

/// Which edge attribute a path query minimises.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum CostDimension {
    /// Travel time in seconds.
    #[default]
    Time,
    /// Length in metres.
    Length,
}

/// Environment services the engine consumes.
///
/// Implementations must be deterministic: the same query always returns the
/// same answer, otherwise runs stop being reproducible.
pub trait Topology {
    /// Ordered positions from `origin` to `destination`, both included.
    fn shortest_path(
        &self,
        origin:      NodeId,
        destination: NodeId,
        cost:        CostDimension,
    ) -> SpatialResult<Vec<NodeId>>;

    /// Total cost of the shortest path.
    fn shortest_path_length(
        &self,
        origin:      NodeId,
        destination: NodeId,
        cost:        CostDimension,
    ) -> SpatialResult<f64>;

    /// Attribute of the direct edge `u → v`.
    fn edge_data(&self, u: NodeId, v: NodeId, attribute: CostDimension) -> SpatialResult<f64>;

    /// Geographic coordinates of a position.
    fn position_localisation(&self, position: NodeId) -> SpatialResult<GeoPoint>;

    /// Closest position to `localisation` reachable with any of `modes`.
    fn nearest_node_in_modes(
        &self,
        localisation: GeoPoint,
        modes:        &[TransportMode],
    ) -> SpatialResult<NodeId>;
}
