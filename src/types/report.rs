use std::fmt;
use std::time::Duration;

use super::Value;

/// Detailed decision report returned by
/// [`Tree::decide_detailed()`](super::Tree::decide_detailed).
///
/// Contains the outcome, the path of conditions walked to reach it, and the
/// wall-clock duration of the decision.
#[derive(Debug, Clone)]
#[must_use]
pub struct DecisionReport {
    outcome: Value,
    path: Vec<DecisionStep>,
    duration: Duration,
}

/// One condition visited during a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionStep {
    predicate: String,
    value: Value,
}

impl DecisionReport {
    pub(crate) fn new(outcome: Value, path: Vec<DecisionStep>, duration: Duration) -> Self {
        Self {
            outcome,
            path,
            duration,
        }
    }

    /// The outcome value, same as [`Tree::decide()`](super::Tree::decide).
    pub fn outcome(&self) -> &Value {
        &self.outcome
    }

    /// Conditions evaluated from the root down, in walk order.
    #[must_use]
    pub fn path(&self) -> &[DecisionStep] {
        &self.path
    }

    /// Wall-clock duration of the decision.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl DecisionStep {
    pub(crate) fn new(predicate: &str, value: Value) -> Self {
        Self {
            predicate: predicate.to_owned(),
            value,
        }
    }

    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// What the predicate evaluated to; the key of the branch taken.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for DecisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.predicate, self.value)
    }
}

impl fmt::Display for DecisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outcome: {}", self.outcome)?;
        write!(f, ", path: [")?;
        for (i, step) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{step}")?;
        }
        write!(f, "], duration: {:?}", self.duration)
    }
}
