//! Stations holding a stock of shared units.

use ms_core::{AgentId, NodeId, OperatorId, StationId};
use ms_sched::Store;

/// A fixed place with a bounded FIFO stock of unit agents (bikes, cars).
///
/// Riders and repositioning staff compete for the stock through the store's
/// `get`/`put` events.
pub struct Station {
    pub id:       StationId,
    pub agent:    AgentId,
    pub name:     String,
    pub position: NodeId,
    pub operator: Option<OperatorId>,
    pub store:    Store,
}

impl Station {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Units currently docked.
    #[inline]
    pub fn stock(&self) -> usize {
        self.store.level()
    }
}

impl std::fmt::Display for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[station={}, position={}, stock={}/{}]", self.name, self.position, self.stock(), self.capacity())
    }
}
