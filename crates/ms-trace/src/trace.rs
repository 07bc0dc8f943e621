//! Append-only per-agent trace.

use ms_core::Tick;

use crate::{EventKind, LeaveOutcome, TraceEvent};

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.  Times must be non-decreasing; the scheduler clock
    /// guarantees it for every caller.
    pub fn push(&mut self, time: Tick, kind: EventKind) {
        debug_assert!(self.events.last().is_none_or(|e| e.time <= time));
        self.events.push(TraceEvent::new(time, kind));
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&TraceEvent> {
        self.events.last()
    }

    /// Events whose [`EventKind::name`] is `name`.
    pub fn of_kind<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.kind.name() == name)
    }

    /// Outcome of the `LeaveSimulation` event, if the agent has left.
    pub fn leave_outcome(&self) -> Option<&LeaveOutcome> {
        self.events.iter().rev().find_map(|e| match &e.kind {
            EventKind::LeaveSimulation { outcome } => Some(outcome),
            _ => None,
        })
    }

    pub fn has_left(&self) -> bool {
        self.leave_outcome().is_some()
    }
}
