//! `Store` — bounded FIFO resource holding stock units.
//!
//! `get` and `put` never block the caller directly; they return an event that
//! resolves when the operation goes through.  A caller that only wants to
//! probe races that event against a zero delay and withdraws the request with
//! [`cancel_get`](Store::cancel_get) / [`cancel_put`](Store::cancel_put) when
//! the timeout wins.

use std::collections::VecDeque;

use ms_core::{AgentId, EventId};

use crate::{Payload, SchedError, SchedResult, Scheduler};

pub struct Store {
    capacity: usize,
    items:    VecDeque<AgentId>,
    getters:  VecDeque<EventId>,
    putters:  VecDeque<(EventId, AgentId)>,
}

impl Store {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items:   VecDeque::new(),
            getters: VecDeque::new(),
            putters: VecDeque::new(),
        }
    }

    /// Create a store pre-filled with `items`.
    pub fn with_items(
        capacity: usize,
        items:    impl IntoIterator<Item = AgentId>,
    ) -> SchedResult<Self> {
        let items: VecDeque<AgentId> = items.into_iter().collect();
        if items.len() > capacity {
            return Err(SchedError::StoreOverflow { items: items.len(), capacity });
        }
        Ok(Self { capacity, items, getters: VecDeque::new(), putters: VecDeque::new() })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of units currently stored.
    pub fn level(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.items.iter().copied()
    }

    /// Number of get requests still waiting for stock.
    pub fn waiting_getters(&self) -> usize {
        self.getters.len()
    }

    /// Request one unit.  The event succeeds with [`Payload::Item`].
    pub fn get(&mut self, sched: &mut Scheduler) -> SchedResult<EventId> {
        let event = sched.new_event();
        self.getters.push_back(event);
        self.settle(sched)?;
        Ok(event)
    }

    /// Offer one unit.  The event succeeds once the unit is stored.
    pub fn put(&mut self, sched: &mut Scheduler, item: AgentId) -> SchedResult<EventId> {
        let event = sched.new_event();
        self.putters.push_back((event, item));
        self.settle(sched)?;
        Ok(event)
    }

    /// Withdraw a pending get.  Returns `false` if it was already served.
    pub fn cancel_get(&mut self, event: EventId) -> bool {
        match self.getters.iter().position(|&e| e == event) {
            Some(i) => {
                self.getters.remove(i);
                true
            }
            None => false,
        }
    }

    /// Withdraw a pending put.  Returns `false` if it was already stored.
    pub fn cancel_put(&mut self, event: EventId) -> bool {
        match self.putters.iter().position(|&(e, _)| e == event) {
            Some(i) => {
                self.putters.remove(i);
                true
            }
            None => false,
        }
    }

    /// Serve queued puts and gets until neither side can progress.
    fn settle(&mut self, sched: &mut Scheduler) -> SchedResult<()> {
        loop {
            let mut progressed = false;

            while self.items.len() < self.capacity {
                let Some((event, item)) = self.putters.pop_front() else { break };
                self.items.push_back(item);
                sched.succeed(event, Payload::Empty)?;
                progressed = true;
            }

            while !self.items.is_empty() && !self.getters.is_empty() {
                if let (Some(event), Some(item)) = (self.getters.pop_front(), self.items.pop_front()) {
                    sched.succeed(event, Payload::Item(item))?;
                    progressed = true;
                }
            }

            if !progressed {
                return Ok(());
            }
        }
    }
}
