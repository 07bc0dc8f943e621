//! Run-level statistics.

use std::time::Duration;

use ms_core::Tick;

/// Counters accumulated during a run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunSummary {
    /// Topology path queries issued by the engine.
    pub shortest_path_calls: u64,
    /// Process resumptions dispatched by the scheduler.
    pub resumptions:         u64,
    pub requests_created:    u64,
    pub requests_fulfilled:  u64,
    pub requests_cancelled:  u64,
    /// Requests no dispatcher accepted.
    pub requests_left_out:   u64,
    /// Pickups refused because the vehicle was full.
    pub capacity_refusals:   u64,
    /// Agents that left with a caught simulation-logic error.
    pub agent_errors:        u64,
    pub end_time:            Tick,
    pub wall_time:           Duration,
}

impl RunSummary {
    /// Fraction of created requests that were fulfilled, `None` before any
    /// request was made.
    pub fn fulfilment_rate(&self) -> Option<f64> {
        (self.requests_created > 0)
            .then(|| self.requests_fulfilled as f64 / self.requests_created as f64)
    }
}
