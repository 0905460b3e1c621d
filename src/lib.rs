//! Data-driven decision trees.
//!
//! A [`Tree`] is a branching structure of [`Condition`]s (predicate text
//! plus a table routing each predicate result to the next node) ending in
//! literal [`Outcome`]s. Trees are built in code or decoded from a JSON
//! document, compiled once with [`Tree::initialize`], then decided against
//! many sets of [`Params`].
//!
//! ```
//! use dectree::{Condition, Node, Outcome, Params, Tree, Value};
//!
//! let tree = Tree::new(
//!     Condition::new("salary >= 50000")?
//!         .with_branch(true, Node::from(Outcome::new("accept")?))
//!         .with_branch(false, Node::from(Outcome::new("decline")?)),
//! );
//!
//! let params = Params::new().set("salary", 60000_i64);
//! assert_eq!(tree.decide(&params)?, &Value::from("accept"));
//! # Ok::<(), dectree::TreeError>(())
//! ```

mod compile;
pub mod document;
mod error;
mod evaluate;
pub mod parse;
#[cfg(feature = "binary-cache")]
pub mod serial;
mod types;

pub use document::{DocumentError, TreeDocument};
pub use error::DectreeError;
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use types::{
    BinaryOp, Branch, CompareOp, Condition, DecisionReport, DecisionStep, EvalError, Expr, Node,
    Outcome, Params, Tree, TreeError, UnaryOp, Value,
};
