use std::collections::HashMap;

use super::branch_key::BranchKey;
use super::error::TreeError;
use super::expr::Expr;
use super::params::Params;
use super::value::Value;

/// A terminal decision value.
///
/// The value must read as a single literal or identifier token, so an
/// outcome can never be mistaken for a predicate in tree text.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    value: Value,
}

impl Outcome {
    /// Create an outcome, validating that `value` is a single token.
    ///
    /// Strings are checked bare (`decline`) or with their own quotes
    /// (`"two words"`).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidOutcome`] if the value's text is empty,
    /// malformed, or contains an operator, or if the value is a non-finite
    /// float.
    pub fn new(value: impl Into<Value>) -> Result<Self, TreeError> {
        let value = value.into();
        let text = value.token_text();
        if matches!(value, Value::Float(f) if !f.is_finite()) {
            return Err(TreeError::InvalidOutcome { value: text });
        }
        match crate::parse::parse_atom(&text) {
            Ok(expr) if expr.is_atomic() => Ok(Self { value }),
            _ => Err(TreeError::InvalidOutcome { value: text }),
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// One position in a tree: a decision point or a terminal result.
#[derive(Debug, Clone)]
pub enum Node {
    Condition(Condition),
    Outcome(Outcome),
}

impl Node {
    #[must_use]
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Node::Condition(c) => Some(c),
            Node::Outcome(_) => None,
        }
    }

    #[must_use]
    pub fn as_outcome(&self) -> Option<&Outcome> {
        match self {
            Node::Outcome(o) => Some(o),
            Node::Condition(_) => None,
        }
    }
}

impl From<Condition> for Node {
    fn from(condition: Condition) -> Self {
        Node::Condition(condition)
    }
}

impl From<Outcome> for Node {
    fn from(outcome: Outcome) -> Self {
        Node::Outcome(outcome)
    }
}

/// A `(value, next node)` pair. The persisted form of one entry in a
/// condition's branch table. `next` may be empty, which makes any decision
/// reaching it undecidable.
#[derive(Debug, Clone)]
pub struct Branch {
    pub(crate) value: Value,
    pub(crate) next: Option<Node>,
}

impl Branch {
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn next(&self) -> Option<&Node> {
        self.next.as_ref()
    }
}

/// A decision point: a predicate plus a table routing each predicate result
/// to the next node.
///
/// Conditions built with [`Condition::new`] are compiled immediately.
/// Conditions decoded from a document stay uncompiled until
/// [`Tree::initialize`](super::Tree::initialize) runs.
#[derive(Debug, Clone)]
pub struct Condition {
    pub(crate) predicate: String,
    pub(crate) branches: Vec<Branch>,
    pub(crate) compiled: Option<CompiledPredicate>,
}

/// Runtime-only state derived from `predicate` and `branches`.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPredicate {
    pub(crate) expr: Expr,
    /// Branch key -> index into `branches`.
    pub(crate) table: HashMap<BranchKey, usize>,
}

impl Condition {
    /// Create a condition from predicate text and compile it.
    ///
    /// The predicate must be a binary expression; a bare literal or
    /// identifier is reserved for outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidCondition`] if the text does not parse,
    /// is not a binary expression, or combines literals an operator cannot
    /// accept.
    pub fn new(predicate: &str) -> Result<Self, TreeError> {
        let expr = crate::compile::compile_predicate(predicate)?;
        Ok(Self {
            predicate: predicate.to_owned(),
            branches: Vec::new(),
            compiled: Some(CompiledPredicate {
                expr,
                table: HashMap::new(),
            }),
        })
    }

    /// An uncompiled condition, as produced by decoding.
    pub(crate) fn uncompiled(predicate: String, branches: Vec<Branch>) -> Self {
        Self {
            predicate,
            branches,
            compiled: None,
        }
    }

    /// Route `value` to `next`. A later branch with an equal value replaces
    /// the earlier one at decision time; both stay in [`branches`](Self::branches).
    ///
    /// The value is not checked against what the predicate can produce; an
    /// unreachable branch simply never matches.
    pub fn add_branch(&mut self, value: impl Into<Value>, next: impl Into<Option<Node>>) {
        let value = value.into();
        let index = self.branches.len();
        if let Some(compiled) = &mut self.compiled {
            if compiled.table.insert(BranchKey::from(&value), index).is_some() {
                tracing::debug!(
                    predicate = %self.predicate,
                    value = %value,
                    "branch value overwrites an earlier branch"
                );
            }
        }
        self.branches.push(Branch {
            value,
            next: next.into(),
        });
    }

    /// Chaining form of [`add_branch`](Self::add_branch).
    #[must_use]
    pub fn with_branch(mut self, value: impl Into<Value>, next: impl Into<Option<Node>>) -> Self {
        self.add_branch(value, next);
        self
    }

    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Rebuild the compiled predicate and branch table from the persisted
    /// predicate text and branch list. Idempotent.
    ///
    /// Child conditions are not visited; see
    /// [`Tree::initialize`](super::Tree::initialize).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidCondition`] if the predicate text is not
    /// a valid condition. The condition is left unchanged in that case.
    pub fn compile(&mut self) -> Result<(), TreeError> {
        crate::compile::compile_condition(self)
    }

    /// Evaluate the predicate and select the next node.
    ///
    /// Returns `Ok(None)` when the selected branch has no next node.
    ///
    /// # Errors
    ///
    /// - [`TreeError::Evaluation`] if the predicate fails against `params`.
    /// - [`TreeError::Undecidable`] if no branch matches the result.
    /// - [`TreeError::NotCompiled`] if the condition was decoded but never
    ///   compiled.
    pub fn next(&self, params: &Params) -> Result<Option<&Node>, TreeError> {
        self.select(params).map(|(_, next)| next)
    }

    /// Like [`next`](Self::next), also returning the predicate's result.
    pub(crate) fn select(&self, params: &Params) -> Result<(Value, Option<&Node>), TreeError> {
        let compiled = self.compiled.as_ref().ok_or_else(|| TreeError::NotCompiled {
            predicate: self.predicate.clone(),
        })?;
        let value = crate::evaluate::eval_expr(&compiled.expr, params)?;
        let Some(&index) = compiled.table.get(&BranchKey::from(&value)) else {
            tracing::debug!(
                predicate = %self.predicate,
                value = %value,
                "no branch for predicate result"
            );
            return Err(TreeError::Undecidable);
        };
        Ok((value, self.branches[index].next.as_ref()))
    }
}
