//! How an agent process ends.

use std::fmt;

/// Cause recorded when a rider could not get a vehicle.
pub const FAIL_GET: &str = "FAIL_GET";

/// Cause recorded when a rider could not return a vehicle.
pub const FAIL_PUT: &str = "FAIL_PUT";

/// Result of an agent loop.  Every agent leaves the simulation exactly once,
/// with one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LeaveOutcome {
    Success,
    /// Still running when the time limit was reached.
    EndOfSimulation,
    /// Business failure with a named cause such as [`FAIL_GET`].
    Failure(String),
    /// A simulation-logic error caught by the process harness.
    Error(String),
}

impl LeaveOutcome {
    pub fn failure(cause: impl Into<String>) -> Self {
        LeaveOutcome::Failure(cause.into())
    }

    /// Cause code written to the trace.
    pub fn cause(&self) -> &str {
        match self {
            LeaveOutcome::Success         => "SUCCESS",
            LeaveOutcome::EndOfSimulation => "END_OF_SIMULATION",
            LeaveOutcome::Failure(cause)  => cause,
            LeaveOutcome::Error(_)        => "ERROR",
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, LeaveOutcome::Success)
    }
}

impl fmt::Display for LeaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveOutcome::Error(message) => write!(f, "ERROR ({message})"),
            other                        => f.write_str(other.cause()),
        }
    }
}
