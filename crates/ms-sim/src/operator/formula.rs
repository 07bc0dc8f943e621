//! Maximum travel time formulas.
//!
//! A formula is an `evalexpr` expression reading the single variable
//! `direct_travel_time`, in seconds:
//!
//! ```text
//! 2 * direct_travel_time + 300
//! max(direct_travel_time * 1.5, direct_travel_time + 600)
//! ```
//!
//! Formulas are parsed once when the operator is built, so a malformed one
//! is a configuration error rather than a failure in the middle of a run.

use std::fmt;
use std::str::FromStr;

use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};

use crate::{SimError, SimResult};

pub const VARIABLE: &str = "direct_travel_time";

/// A parsed maximum travel time formula.
#[derive(Clone, Debug)]
pub struct Formula {
    source: String,
    tree:   Node,
}

impl Formula {
    pub fn parse(source: &str) -> SimResult<Self> {
        let invalid = |reason: String| SimError::config(format!("invalid formula '{source}': {reason}"));
        let tree = build_operator_tree(source).map_err(|e| invalid(e.to_string()))?;
        if let Some(name) = tree.iter_variable_identifiers().find(|&name| name != VARIABLE) {
            return Err(invalid(format!("unknown variable '{name}'")));
        }
        let formula = Self { source: source.to_owned(), tree };
        // Rejects empty, non-numeric and assigning expressions, and constant
        // integer divisions by zero.
        formula.eval(1.0).map_err(|e| invalid(e.to_string()))?;
        Ok(formula)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, direct_travel_time: f64) -> SimResult<f64> {
        let mut context = HashMapContext::new();
        context
            .set_value(VARIABLE.into(), Value::Float(direct_travel_time))
            .map_err(|e| SimError::config(e.to_string()))?;
        self.tree
            .eval_number_with_context(&context)
            .map_err(|e| SimError::config(format!("formula '{}': {e}", self.source)))
    }

    /// Evaluate for a direct travel time in seconds.  Results that are not
    /// a finite non-negative duration give `None`.
    pub fn max_travel_time(&self, direct_travel_time: u64) -> Option<u64> {
        match self.eval(direct_travel_time as f64) {
            Ok(value) if value.is_finite() && value >= 0.0 => Some(value.round() as u64),
            Ok(value) => {
                log::warn!("formula '{}' gives {value} for {direct_travel_time}s", self.source);
                None
            }
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FromStr for Formula {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
