use thiserror::Error;

use ms_core::NodeId;

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("node {0} is not part of the topology")]
    UnknownNode(NodeId),

    #[error("no edge between {u} and {v}")]
    NoEdge { u: NodeId, v: NodeId },

    #[error("no node serves the requested modes")]
    NoNodeForModes,
}

pub type SpatialResult<T> = Result<T, SpatialError>;
