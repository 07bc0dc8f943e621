//! Operator configuration, read from the `operation_parameters` JSON object.
//!
//! | Key                  | Type                    | Default          |
//! |----------------------|-------------------------|------------------|
//! | `dispatcher`         | registry key            | none             |
//! | `max_travel_time`    | formula over `direct_travel_time` | none   |
//! | `max_detour`         | float (factor) or int (seconds)   | none   |
//! | `idle`               | `"indefinite"` or `{"timeout": s}`| indefinite |
//! | `start_times`        | `[u64]`                 | `[25000]`        |
//! | `durations`          | `[u64]` or null         | `[12000]`        |
//! | `neighbor`           | `util`/`nearest`/`random` | `util`         |
//! | `threshold`          | `{min, max}`            | `{0.1, 0.1}`     |
//! | `priority_threshold` | `max`/`min`             | `max`            |

use serde::Deserialize;

use crate::operator::Formula;
use crate::{SimError, SimResult};

/// What an idle vehicle does while waiting for a planning.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleBehaviour {
    /// Wait for the signal only.
    #[default]
    Indefinite,
    /// Wake up every `n` seconds even without a new planning.
    Timeout(u64),
}

/// Allowed detour over the direct travel time.
///
/// An integer is a number of seconds added to the direct travel time, a
/// float multiplies it.  Negative numbers only parse as a factor and are
/// rejected by [`OperationParameters::validate`].
#[derive(Copy, Clone, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub enum Detour {
    Offset(u64),
    Factor(f64),
}

impl Detour {
    pub fn apply(self, direct: u64) -> u64 {
        match self {
            Detour::Offset(secs)  => direct + secs,
            Detour::Factor(f)     => (direct as f64 * f).round() as u64,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborStrategy {
    /// Best ratio of achievable operations to travel time.
    #[default]
    Util,
    Nearest,
    Random,
}

/// Which stock bound wins when a station cannot respect both.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityThreshold {
    #[default]
    Max,
    Min,
}

/// Stock bounds avoided by the repositioning heuristic.
///
/// A value strictly between 0 and 1 is a fraction of the station capacity;
/// any other value is a number of units (from empty for `min`, from full
/// for `max`).
#[derive(Copy, Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct Threshold {
    pub min: f64,
    pub max: f64,
}

impl Default for Threshold {
    fn default() -> Self {
        Self { min: 0.1, max: 0.1 }
    }
}

impl Threshold {
    /// `(lowest, highest)` acceptable stock for a station of `capacity`.
    pub fn bounds(&self, capacity: usize) -> (i64, i64) {
        let capacity = capacity as f64;
        let low = if 0.0 < self.min && self.min < 1.0 { self.min * capacity } else { self.min };
        let high = if 0.0 < self.max && self.max < 1.0 {
            (1.0 - self.max) * capacity
        } else {
            capacity - self.max
        };
        (low as i64, high as i64)
    }
}

/// Parameters of the greedy repositioning heuristic.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct PalZhangParams {
    /// Times at which a repositioning tour is planned.
    pub start_times:        Vec<u64>,
    /// Maximum duration of each tour; `None` means unbounded.
    pub durations:          Option<Vec<u64>>,
    pub neighbor:           NeighborStrategy,
    pub threshold:          Threshold,
    pub priority_threshold: PriorityThreshold,
}

impl Default for PalZhangParams {
    fn default() -> Self {
        Self {
            start_times:        vec![25_000],
            durations:          Some(vec![12_000]),
            neighbor:           NeighborStrategy::default(),
            threshold:          Threshold::default(),
            priority_threshold: PriorityThreshold::default(),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OperationParameters {
    /// Key of the dispatcher in the registry.
    pub dispatcher:      Option<String>,
    /// Arithmetic formula over `direct_travel_time`, e.g.
    /// `"direct_travel_time * 1.5 + 300"`.
    pub max_travel_time: Option<String>,
    /// Used when no formula is given.
    pub max_detour:      Option<Detour>,
    pub idle:            IdleBehaviour,
    #[serde(flatten)]
    pub relocation:      PalZhangParams,
}

impl OperationParameters {
    pub fn from_json(json: &str) -> SimResult<Self> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| SimError::config(format!("operation parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_dispatcher(mut self, key: impl Into<String>) -> Self {
        self.dispatcher = Some(key.into());
        self
    }

    /// The parsed travel time formula, if any.
    pub fn formula(&self) -> SimResult<Option<Formula>> {
        self.max_travel_time.as_deref().map(Formula::parse).transpose()
    }

    pub fn validate(&self) -> SimResult<()> {
        self.formula()?;
        if let Some(Detour::Factor(f)) = self.max_detour
            && !(f.is_finite() && f >= 0.0)
        {
            return Err(SimError::config(format!("max_detour must be non-negative, got {f}")));
        }

        let r = &self.relocation;
        if r.start_times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::config("start_times must be strictly increasing"));
        }
        if let Some(durations) = &r.durations
            && durations.len() != r.start_times.len()
        {
            return Err(SimError::config(format!(
                "{} durations for {} start times",
                durations.len(),
                r.start_times.len()
            )));
        }
        if r.threshold.min < 0.0 || r.threshold.max < 0.0 {
            return Err(SimError::config("stock thresholds must be non-negative"));
        }
        Ok(())
    }
}
