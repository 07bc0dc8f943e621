//! Simulation time model.
//!
//! # Design
//!
//! Time is a single integer clock counted in simulated seconds.  `Tick` is an
//! absolute instant, `Delay` a relative duration handed to the scheduler.
//! Integer time keeps all schedule arithmetic exact, so two runs with the
//! same seed produce identical traces.
//!
//! `Delay::Inf` is the "wait forever" duration.  The scheduler resolves it to
//! the configured time limit, where the run stops.

use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation instant, in seconds since the start of the run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);
    pub const MAX: Tick = Tick(u64::MAX);

    /// Return the tick `n` seconds after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0.saturating_add(n))
    }

    /// Seconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Signed difference `self - earlier`, for KPIs that may be negative.
    #[inline]
    pub fn signed_since(self, earlier: Tick) -> i64 {
        self.0 as i64 - earlier.0 as i64
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        self.offset(rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.since(rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── Delay ─────────────────────────────────────────────────────────────────────

/// A relative duration accepted by the scheduler.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Delay {
    /// A finite number of seconds.
    Finite(u64),
    /// Never elapses before the simulation time limit.
    Inf,
}

impl Delay {
    pub const ZERO: Delay = Delay::Finite(0);

    #[inline]
    pub fn secs(n: u64) -> Delay {
        Delay::Finite(n)
    }

    /// Validate a raw duration.
    ///
    /// Negative, NaN and non-integral values are rejected; `+inf` maps to
    /// [`Delay::Inf`].
    pub fn from_secs(value: f64) -> CoreResult<Delay> {
        if value.is_nan() || value < 0.0 {
            return Err(CoreError::InvalidDuration(format!(
                "duration must be a non-negative integer, got {value}"
            )));
        }
        if value.is_infinite() {
            return Ok(Delay::Inf);
        }
        if value.fract() != 0.0 {
            return Err(CoreError::InvalidDuration(format!(
                "duration must be integral, got {value}"
            )));
        }
        Ok(Delay::Finite(value as u64))
    }

    /// Validate a signed integer duration.
    pub fn from_signed(value: i64) -> CoreResult<Delay> {
        u64::try_from(value).map(Delay::Finite).map_err(|_| {
            CoreError::InvalidDuration(format!("duration must be non-negative, got {value}"))
        })
    }

    /// Absolute tick at which this delay elapses when started at `now`.
    ///
    /// `Inf` resolves to `limit`; finite delays are not capped.
    #[inline]
    pub fn resolve(self, now: Tick, limit: Tick) -> Tick {
        match self {
            Delay::Finite(n) => now.offset(n),
            Delay::Inf       => limit,
        }
    }

    #[inline]
    pub fn is_infinite(self) -> bool {
        matches!(self, Delay::Inf)
    }
}

impl From<u64> for Delay {
    fn from(n: u64) -> Self {
        Delay::Finite(n)
    }
}

impl FromStr for Delay {
    type Err = CoreError;

    /// Parses `"inf"` or a non-negative integral number of seconds.
    fn from_str(s: &str) -> CoreResult<Delay> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("inf") {
            return Ok(Delay::Inf);
        }
        let value: f64 = s
            .parse()
            .map_err(|_| CoreError::InvalidDuration(format!("cannot parse duration {s:?}")))?;
        Delay::from_secs(value)
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Finite(n) => write!(f, "{n}s"),
            Delay::Inf       => f.write_str("inf"),
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level run configuration.
///
/// Typically deserialised from the scenario parameters by the application and
/// handed to the simulation builder.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Time limit of the run, in seconds.  Nothing is processed at or after
    /// this instant.
    pub limit: u64,

    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,
}

impl SimConfig {
    pub fn new(limit: u64, seed: u64) -> Self {
        Self { limit, seed }
    }

    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.limit)
    }

    /// Reject configurations the scheduler cannot run.
    pub fn validate(&self) -> CoreResult<()> {
        if self.limit == 0 {
            return Err(CoreError::Config("time limit must be positive".into()));
        }
        Ok(())
    }
}
