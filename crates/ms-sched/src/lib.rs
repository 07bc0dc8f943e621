//! `ms-sched` — the discrete-event clock every agent suspends on.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`scheduler`]   | `Scheduler`: clock, process table, event arena            |
//! | [`wait`]        | `Wait` (event OR timeout composite), `Wake`               |
//! | [`event`]       | `Outcome`, `Payload`, `EventState`                        |
//! | [`wake_queue`]  | `WakeQueue` (`BTreeMap<Tick, VecDeque<Wakeup>>`)           |
//! | [`store`]       | `Store`: bounded FIFO resource with blocking get/put      |
//! | [`error`]       | `SchedError`, `SchedResult<T>`                            |
//!
//! # Process model
//!
//! Agents are explicit state machines.  Each time one is resumed it returns
//! the [`Wait`] it wants to suspend on; the scheduler records it and hands
//! back a [`Wake`] describing which side of the race won.
//!
//! ```text
//! loop:
//!   (pid, wake) = scheduler.next()      ← earliest tick, FIFO within a tick
//!   step        = process[pid].resume(wake)
//!   scheduler.suspend(pid, step.wait)   ← registers events + timeout
//! ```
//!
//! A per-process wait token makes every suspension single-use: once one side
//! of a composite wait fires, the other side's wakeup is stale and dropped.

pub mod error;
pub mod event;
pub mod scheduler;
pub mod store;
pub mod wait;
pub mod wake_queue;


pub use error::{SchedError, SchedResult};
pub use event::{EventState, Outcome, Payload};
pub use scheduler::Scheduler;
pub use store::Store;
pub use wait::{Wait, Wake};
pub use wake_queue::{WakeQueue, Wakeup};
