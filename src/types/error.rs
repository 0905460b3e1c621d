use thiserror::Error;

use super::expr::{BinaryOp, UnaryOp};

/// Errors raised while building, compiling, or deciding a tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("invalid outcome '{value}': must be a single literal or identifier")]
    InvalidOutcome { value: String },

    #[error("invalid condition '{predicate}': {reason}")]
    InvalidCondition { predicate: String, reason: String },

    #[error("undecidable")]
    Undecidable,

    #[error("condition '{predicate}' is not compiled; call Tree::initialize first")]
    NotCompiled { predicate: String },

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

/// Errors raised while evaluating a predicate against parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("no parameter named '{name}'")]
    MissingParameter { name: String },

    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("operator '{op}' cannot be applied to {operand}")]
    UnaryTypeMismatch { op: UnaryOp, operand: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{op}'")]
    Overflow { op: BinaryOp },
}

impl TreeError {
    pub(crate) fn invalid_condition(predicate: &str, reason: impl Into<String>) -> Self {
        TreeError::InvalidCondition {
            predicate: predicate.to_owned(),
            reason: reason.into(),
        }
    }
}
