mod branch_key;
mod error;
mod expr;
mod node;
mod params;
mod report;
mod tree;
mod value;

pub(crate) use branch_key::BranchKey;
pub use error::{EvalError, TreeError};
pub use expr::{BinaryOp, CompareOp, Expr, UnaryOp};
pub(crate) use node::CompiledPredicate;
pub use node::{Branch, Condition, Node, Outcome};
pub use params::Params;
pub use report::{DecisionReport, DecisionStep};
pub use tree::Tree;
pub use value::Value;
