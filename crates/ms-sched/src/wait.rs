//! Suspension requests and resumption reasons.

use ms_core::{Delay, EventId};

use crate::Outcome;

/// What a process suspends on: any of `events`, or `delay` elapsing,
/// whichever comes first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wait {
    pub events: Vec<EventId>,
    pub delay:  Option<Delay>,
}

impl Wait {
    /// Plain timeout.
    pub fn timeout(delay: impl Into<Delay>) -> Self {
        Self { events: Vec::new(), delay: Some(delay.into()) }
    }

    /// Suspend until the simulation time limit.
    pub fn forever() -> Self {
        Self::timeout(Delay::Inf)
    }

    /// Wait on a single event with no timeout.
    pub fn event(event: EventId) -> Self {
        Self { events: vec![event], delay: None }
    }

    /// The "event OR timeout" race used throughout the request protocol.
    pub fn event_or_timeout(event: EventId, delay: impl Into<Delay>) -> Self {
        Self { events: vec![event], delay: Some(delay.into()) }
    }

    /// Wait on whichever of `events` resolves first.
    pub fn any(events: impl IntoIterator<Item = EventId>) -> Self {
        Self { events: events.into_iter().collect(), delay: None }
    }

    /// Add (or replace) the timeout side of the race.
    pub fn or_timeout(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = Some(delay.into());
        self
    }
}

/// Why a process was resumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wake {
    /// First activation after registration.
    Start,
    /// The delay side of the wait elapsed.
    Timeout,
    /// One of the awaited events resolved.
    Event { event: EventId, outcome: Outcome },
    /// Another agent interrupted the pending wait.
    Interrupt(String),
}

impl Wake {
    /// `true` if the wake is the given event resolving (either way).
    #[inline]
    pub fn is_event(&self, id: EventId) -> bool {
        matches!(self, Wake::Event { event, .. } if *event == id)
    }
}
