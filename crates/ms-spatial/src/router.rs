//! Dijkstra over the CSR graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ms_core::NodeId;

use crate::network::RoadNetwork;
use crate::{CostDimension, SpatialError, SpatialResult};

/// A found path: node sequence (origin and destination included) and its
/// integer cost in the queried dimension.
pub(crate) struct PathCost {
    pub nodes: Vec<NodeId>,
    pub total: u64,
}

pub(crate) fn dijkstra(
    network: &RoadNetwork,
    from:    NodeId,
    to:      NodeId,
    cost:    CostDimension,
) -> SpatialResult<PathCost> {
    if from == to {
        return Ok(PathCost { nodes: vec![from], total: 0 });
    }

    let n = network.node_count();
    let mut dist = vec![u64::MAX; n];
    let mut prev_edge: Vec<Option<usize>> = vec![None; n];
    dist[from.index()] = 0;

    // Secondary key NodeId keeps tie-breaking deterministic.
    let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
    heap.push(Reverse((0, from)));

    while let Some(Reverse((d, node))) = heap.pop() {
        if node == to {
            return Ok(PathCost { nodes: reconstruct(network, &prev_edge, to), total: d });
        }
        if d > dist[node.index()] {
            continue;
        }
        for edge in network.out_edges(node) {
            let next = network.edge_to[edge];
            let nd = d.saturating_add(network.edge_cost(edge, cost));
            if nd < dist[next.index()] {
                dist[next.index()] = nd;
                prev_edge[next.index()] = Some(edge);
                heap.push(Reverse((nd, next)));
            }
        }
    }

    Err(SpatialError::NoRoute { from, to })
}

fn reconstruct(network: &RoadNetwork, prev_edge: &[Option<usize>], to: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![to];
    let mut cur = to;
    while let Some(e) = prev_edge[cur.index()] {
        cur = network.edge_from[e];
        nodes.push(cur);
    }
    nodes.reverse();
    nodes
}
