//! In-memory road network implementing [`Topology`].
//!
//! # Data layout
//!
//! Outgoing edges are stored in **Compressed Sparse Row** form: the edges of
//! node `n` occupy `node_out_start[n] .. node_out_start[n + 1]` in every edge
//! array, so Dijkstra's inner loop is a contiguous scan.
//!
//! Each edge carries a bitmask of the [`TransportMode`]s allowed on it.  A
//! node serves a mode when at least one incident edge allows it, which is
//! what [`Topology::nearest_node_in_modes`] filters on.
//!
//! # Spatial index
//!
//! An `rstar` R-tree over `[lat, lon]` answers nearest-node queries.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use ms_core::{GeoPoint, NodeId, TransportMode};

use crate::router::{dijkstra, PathCost};
use crate::{CostDimension, SpatialError, SpatialResult, Topology};

const ALL_MODES: u8 = 0b1111;

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2], // [lat, lon]
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space, fine at city scale.
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed graph in CSR format plus a spatial index.
///
/// Build with [`RoadNetworkBuilder`].
pub struct RoadNetwork {
    pub node_pos:         Vec<GeoPoint>,
    /// Union of the mode bits of each node's incident edges.
    pub node_modes:       Vec<u8>,
    /// CSR row pointer, length `node_count + 1`.
    pub node_out_start:   Vec<u32>,
    pub edge_from:        Vec<NodeId>,
    pub edge_to:          Vec<NodeId>,
    pub edge_length_m:    Vec<f32>,
    pub edge_travel_secs: Vec<u32>,
    pub edge_modes:       Vec<u8>,
    spatial_idx:          RTree<NodeEntry>,
}

impl RoadNetwork {
    pub fn empty() -> Self {
        RoadNetworkBuilder::new().build()
    }

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    /// Range of edge indices leaving `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> std::ops::Range<usize> {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        start..end
    }

    /// Integer cost of one edge in the given dimension (seconds or
    /// centimetres, so Dijkstra can order on integers).
    #[inline]
    pub(crate) fn edge_cost(&self, edge: usize, cost: CostDimension) -> u64 {
        match cost {
            CostDimension::Time   => self.edge_travel_secs[edge] as u64,
            CostDimension::Length => (self.edge_length_m[edge] * 100.0).round() as u64,
        }
    }

    fn find_edge(&self, u: NodeId, v: NodeId) -> SpatialResult<usize> {
        if !self.contains(u) {
            return Err(SpatialError::UnknownNode(u));
        }
        self.out_edges(u)
            .find(|&e| self.edge_to[e] == v)
            .ok_or(SpatialError::NoEdge { u, v })
    }

    fn route(&self, origin: NodeId, destination: NodeId, cost: CostDimension) -> SpatialResult<PathCost> {
        for node in [origin, destination] {
            if !self.contains(node) {
                return Err(SpatialError::UnknownNode(node));
            }
        }
        dijkstra(self, origin, destination, cost)
    }
}

impl Topology for RoadNetwork {
    fn shortest_path(
        &self,
        origin:      NodeId,
        destination: NodeId,
        cost:        CostDimension,
    ) -> SpatialResult<Vec<NodeId>> {
        Ok(self.route(origin, destination, cost)?.nodes)
    }

    fn shortest_path_length(
        &self,
        origin:      NodeId,
        destination: NodeId,
        cost:        CostDimension,
    ) -> SpatialResult<f64> {
        let total = self.route(origin, destination, cost)?.total;
        Ok(match cost {
            CostDimension::Time   => total as f64,
            CostDimension::Length => total as f64 / 100.0,
        })
    }

    fn edge_data(&self, u: NodeId, v: NodeId, attribute: CostDimension) -> SpatialResult<f64> {
        let e = self.find_edge(u, v)?;
        Ok(match attribute {
            CostDimension::Time   => self.edge_travel_secs[e] as f64,
            CostDimension::Length => self.edge_length_m[e] as f64,
        })
    }

    fn position_localisation(&self, position: NodeId) -> SpatialResult<GeoPoint> {
        self.node_pos
            .get(position.index())
            .copied()
            .ok_or(SpatialError::UnknownNode(position))
    }

    fn nearest_node_in_modes(
        &self,
        localisation: GeoPoint,
        modes:        &[TransportMode],
    ) -> SpatialResult<NodeId> {
        let wanted = if modes.is_empty() {
            ALL_MODES
        } else {
            modes.iter().fold(0u8, |acc, m| acc | m.bit())
        };
        self.spatial_idx
            .nearest_neighbor_iter(&[localisation.lat, localisation.lon])
            .find(|entry| self.node_modes[entry.id.index()] & wanted != 0)
            .map(|entry| entry.id)
            .ok_or(SpatialError::NoNodeForModes)
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use ms_core::GeoPoint;
/// use ms_spatial::RoadNetworkBuilder;
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(GeoPoint::new(45.76, 4.83));
/// let c = b.add_node(GeoPoint::new(45.77, 4.84));
/// b.add_road(a, c, 1_200.0, 90);
/// let net = b.build();
/// assert_eq!(net.edge_count(), 2); // both directions
/// ```
#[derive(Default)]
pub struct RoadNetworkBuilder {
    nodes:     Vec<GeoPoint>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:        NodeId,
    to:          NodeId,
    length_m:    f32,
    travel_secs: u32,
    modes:       u8,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a directed edge restricted to `modes` (empty = every mode).
    pub fn add_directed_edge(
        &mut self,
        from:        NodeId,
        to:          NodeId,
        length_m:    f32,
        travel_secs: u32,
        modes:       &[TransportMode],
    ) {
        let modes = if modes.is_empty() {
            ALL_MODES
        } else {
            modes.iter().fold(0u8, |acc, m| acc | m.bit())
        };
        self.raw_edges.push(RawEdge { from, to, length_m, travel_secs, modes });
    }

    /// Two-way road open to every mode.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, length_m: f32, travel_secs: u32) {
        self.add_road_for(a, b, length_m, travel_secs, &[]);
    }

    /// Two-way road open to `modes` only.
    pub fn add_road_for(
        &mut self,
        a:           NodeId,
        b:           NodeId,
        length_m:    f32,
        travel_secs: u32,
        modes:       &[TransportMode],
    ) {
        self.add_directed_edge(a, b, length_m, travel_secs, modes);
        self.add_directed_edge(b, a, length_m, travel_secs, modes);
    }

    pub fn build(self) -> RoadNetwork {
        let node_count = self.nodes.len();

        let mut raw = self.raw_edges;
        raw.sort_by_key(|e| e.from.0);

        let edge_from:        Vec<NodeId> = raw.iter().map(|e| e.from).collect();
        let edge_to:          Vec<NodeId> = raw.iter().map(|e| e.to).collect();
        let edge_length_m:    Vec<f32>    = raw.iter().map(|e| e.length_m).collect();
        let edge_travel_secs: Vec<u32>    = raw.iter().map(|e| e.travel_secs).collect();
        let edge_modes:       Vec<u8>     = raw.iter().map(|e| e.modes).collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        let mut node_modes = vec![0u8; node_count];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
            node_modes[e.from.index()] |= e.modes;
            node_modes[e.to.index()] |= e.modes;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| NodeEntry { point: [pos.lat, pos.lon], id: NodeId(i as u32) })
            .collect();

        RoadNetwork {
            node_pos: self.nodes,
            node_modes,
            node_out_start,
            edge_from,
            edge_to,
            edge_length_m,
            edge_travel_secs,
            edge_modes,
            spatial_idx: RTree::bulk_load(entries),
        }
    }
}
