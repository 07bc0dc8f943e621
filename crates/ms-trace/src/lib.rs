//! `ms-trace` — what happened to every agent, in order.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`event`]   | `TraceEvent`, `EventKind`, `RequestRecord`                |
//! | [`outcome`] | `LeaveOutcome` and the named failure causes               |
//! | [`trace`]   | `Trace`: append-only per-agent event list                 |
//! | [`summary`] | `RunSummary`: counters exposed to the output layer        |
//!
//! Events carry ids only.  Turning them into GeoJSON, KPI tables or XML is
//! the output layer's business.

pub mod event;
pub mod outcome;
pub mod summary;
pub mod trace;


pub use event::{EventKind, RequestRecord, TraceEvent};
pub use outcome::{LeaveOutcome, FAIL_GET, FAIL_PUT};
pub use summary::RunSummary;
pub use trace::Trace;
