//! One-shot event values.

use ms_core::AgentId;

/// Value carried by a successful event.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Payload {
    #[default]
    Empty,
    /// A stock unit handed over by a [`Store`][crate::Store] get.
    Item(AgentId),
}

/// How an event was resolved.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    Succeeded(Payload),
    Failed,
}

impl Outcome {
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    /// The item carried by a successful store get, if any.
    #[inline]
    pub fn item(self) -> Option<AgentId> {
        match self {
            Outcome::Succeeded(Payload::Item(item)) => Some(item),
            _ => None,
        }
    }
}

/// Lifecycle of an event: resolved exactly once.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum EventState {
    #[default]
    Pending,
    Resolved(Outcome),
}

impl EventState {
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, EventState::Pending)
    }

    #[inline]
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            EventState::Pending     => None,
            EventState::Resolved(o) => Some(o),
        }
    }
}
