//! The `Scheduler`: single global clock, process table and event arena.

use ms_core::{Delay, EventId, ProcessId, Tick};

use crate::{EventState, Outcome, Payload, SchedError, SchedResult, Wait, Wake, WakeQueue, Wakeup};

struct ProcessSlot {
    name:  String,
    /// Incremented on every suspension and interruption.  Wakeups carrying an
    /// older token are stale.
    token: u64,
    alive: bool,
}

struct EventSlot {
    state:   EventState,
    waiters: Vec<(ProcessId, u64)>,
}

/// Discrete-event clock advancing in integer seconds.
///
/// The scheduler never owns process state; it only decides *who* resumes
/// *when* and *why*.  The simulation runner holds the processes and feeds
/// the returned [`Wait`]s back through [`suspend`](Self::suspend).
pub struct Scheduler {
    now:         Tick,
    limit:       Tick,
    queue:       WakeQueue,
    processes:   Vec<ProcessSlot>,
    events:      Vec<EventSlot>,
    resumptions: u64,
}

impl Scheduler {
    /// Create a scheduler whose run stops at `limit` (exclusive).
    pub fn new(limit: Tick) -> Self {
        Self {
            now:         Tick::ZERO,
            limit,
            queue:       WakeQueue::new(),
            processes:   Vec::new(),
            events:      Vec::new(),
            resumptions: 0,
        }
    }

    // ── Clock ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn now(&self) -> Tick {
        self.now
    }

    #[inline]
    pub fn limit(&self) -> Tick {
        self.limit
    }

    /// Number of process resumptions dispatched so far.
    pub fn resumptions(&self) -> u64 {
        self.resumptions
    }

    /// Number of wakeups still queued (stale ones included).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Validated timeout suspension.
    ///
    /// `f64::INFINITY` waits until the time limit; negative or non-integral
    /// durations are rejected.
    pub fn timeout(&self, secs: f64) -> SchedResult<Wait> {
        Ok(Wait::timeout(Delay::from_secs(secs)?))
    }

    /// Move the clock to the time limit once the run is over.
    pub fn close(&mut self) {
        if self.now < self.limit {
            self.now = self.limit;
        }
    }

    // ── Processes ─────────────────────────────────────────────────────────

    /// Register a new cooperative process.  It receives [`Wake::Start`] at
    /// the current time, after everything already queued for this tick.
    pub fn register(&mut self, name: impl Into<String>) -> ProcessId {
        let id = ProcessId(self.processes.len() as u32);
        self.processes.push(ProcessSlot { name: name.into(), token: 0, alive: true });
        self.queue.push(self.now, Wakeup { process: id, token: 0, wake: Wake::Start });
        id
    }

    pub fn process_name(&self, process: ProcessId) -> Option<&str> {
        self.processes.get(process.index()).map(|p| p.name.as_str())
    }

    pub fn is_alive(&self, process: ProcessId) -> bool {
        self.processes.get(process.index()).is_some_and(|p| p.alive)
    }

    /// Mark a process as finished.  Its queued wakeups are discarded.
    pub fn finish(&mut self, process: ProcessId) {
        if let Some(slot) = self.processes.get_mut(process.index()) {
            slot.alive = false;
            slot.token += 1;
        }
    }

    fn live_slot(&mut self, process: ProcessId) -> SchedResult<&mut ProcessSlot> {
        match self.processes.get_mut(process.index()) {
            Some(slot) if slot.alive => Ok(slot),
            _ => Err(SchedError::UnknownProcess(process)),
        }
    }

    /// Suspend `process` on `wait`.
    ///
    /// An event that is already resolved wins immediately: the process is
    /// resumed at the current time and the rest of the wait is ignored.
    /// An infinite delay is never queued, since it could only fire at the
    /// limit where nothing is processed.
    pub fn suspend(&mut self, process: ProcessId, wait: Wait) -> SchedResult<()> {
        if wait.events.is_empty() && wait.delay.is_none() {
            return Err(SchedError::EmptyWait(process));
        }
        let now = self.now;
        let limit = self.limit;
        let slot = self.live_slot(process)?;
        slot.token += 1;
        let token = slot.token;

        for &event in &wait.events {
            let state = self.event_slot(event)?.state;
            if let EventState::Resolved(outcome) = state {
                self.queue.push(now, Wakeup { process, token, wake: Wake::Event { event, outcome } });
                return Ok(());
            }
        }
        for &event in &wait.events {
            self.event_slot_mut(event)?.waiters.push((process, token));
        }
        match wait.delay {
            Some(Delay::Inf) | None => {}
            Some(delay) => {
                let at = delay.resolve(now, limit);
                self.queue.push(at, Wakeup { process, token, wake: Wake::Timeout });
            }
        }
        Ok(())
    }

    /// Cancel the pending wait of `process` and resume it with
    /// [`Wake::Interrupt`] at the current time.
    pub fn interrupt(&mut self, process: ProcessId, message: impl Into<String>) -> SchedResult<()> {
        let now = self.now;
        let slot = self.live_slot(process)?;
        slot.token += 1;
        let token = slot.token;
        self.queue.push(now, Wakeup { process, token, wake: Wake::Interrupt(message.into()) });
        Ok(())
    }

    /// Pop the next live resumption strictly before the time limit and move
    /// the clock to it.
    pub fn next(&mut self) -> Option<(ProcessId, Wake)> {
        loop {
            if self.queue.next_tick()? >= self.limit {
                return None;
            }
            let (tick, wakeup) = self.queue.pop_front()?;
            let live = self
                .processes
                .get(wakeup.process.index())
                .is_some_and(|p| p.alive && p.token == wakeup.token);
            if !live {
                continue;
            }
            self.now = tick;
            self.resumptions += 1;
            return Some((wakeup.process, wakeup.wake));
        }
    }

    // ── Events ────────────────────────────────────────────────────────────

    /// Create a fresh pending one-shot event.
    pub fn new_event(&mut self) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(EventSlot { state: EventState::Pending, waiters: Vec::new() });
        id
    }

    fn event_slot(&self, event: EventId) -> SchedResult<&EventSlot> {
        self.events.get(event.index()).ok_or(SchedError::UnknownEvent(event))
    }

    fn event_slot_mut(&mut self, event: EventId) -> SchedResult<&mut EventSlot> {
        self.events.get_mut(event.index()).ok_or(SchedError::UnknownEvent(event))
    }

    pub fn state(&self, event: EventId) -> SchedResult<EventState> {
        Ok(self.event_slot(event)?.state)
    }

    /// `true` if the event exists and has not been resolved yet.
    pub fn is_pending(&self, event: EventId) -> bool {
        self.events.get(event.index()).is_some_and(|e| e.state.is_pending())
    }

    pub fn succeed(&mut self, event: EventId, payload: Payload) -> SchedResult<()> {
        self.resolve(event, Outcome::Succeeded(payload))
    }

    pub fn fail(&mut self, event: EventId) -> SchedResult<()> {
        self.resolve(event, Outcome::Failed)
    }

    fn resolve(&mut self, event: EventId, outcome: Outcome) -> SchedResult<()> {
        let now = self.now;
        let slot = self.event_slot_mut(event)?;
        if !slot.state.is_pending() {
            return Err(SchedError::AlreadyTriggered(event));
        }
        slot.state = EventState::Resolved(outcome);
        let waiters = std::mem::take(&mut slot.waiters);

        for (process, token) in waiters {
            let current = self
                .processes
                .get(process.index())
                .is_some_and(|p| p.alive && p.token == token);
            if current {
                self.queue.push(now, Wakeup { process, token, wake: Wake::Event { event, outcome } });
            }
        }
        Ok(())
    }
}
