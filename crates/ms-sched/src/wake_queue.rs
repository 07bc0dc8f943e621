//! `WakeQueue` — time-ordered queue of pending process resumptions.
//!
//! `BTreeMap` keyed by tick gives the earliest instant in O(log W), where W
//! is the number of distinct future ticks.  Within one tick, entries sit in a
//! `VecDeque` and come out in insertion order, which is the scheduler's
//! deterministic tie-break between simultaneously ready processes.

use std::collections::{BTreeMap, VecDeque};

use ms_core::{ProcessId, Tick};

use crate::Wake;

/// One pending resumption.
#[derive(Clone, Debug)]
pub struct Wakeup {
    pub process: ProcessId,
    /// Wait token of the suspension this wakeup belongs to.
    pub token:   u64,
    pub wake:    Wake,
}

#[derive(Default)]
pub struct WakeQueue {
    inner: BTreeMap<Tick, VecDeque<Wakeup>>,
    total: usize,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `wakeup` at `tick`, after everything already queued there.
    pub fn push(&mut self, tick: Tick, wakeup: Wakeup) {
        self.inner.entry(tick).or_default().push_back(wakeup);
        self.total += 1;
    }

    /// Remove and return the oldest entry of the earliest tick.
    pub fn pop_front(&mut self) -> Option<(Tick, Wakeup)> {
        let mut first = self.inner.first_entry()?;
        let tick = *first.key();
        let wakeup = first.get_mut().pop_front();
        if first.get().is_empty() {
            first.remove();
        }
        let wakeup = wakeup?;
        self.total -= 1;
        Some((tick, wakeup))
    }

    /// The earliest tick with at least one queued entry.
    pub fn next_tick(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
