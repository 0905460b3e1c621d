use std::collections::{HashMap, VecDeque};

use crate::types::{BranchKey, CompiledPredicate};
use crate::{BinaryOp, CompareOp, Condition, Expr, Node, TreeError, UnaryOp, Value};

/// Parse predicate text and check it is a well-formed binary expression.
pub(crate) fn compile_predicate(predicate: &str) -> Result<Expr, TreeError> {
    let expr = crate::parse::parse(predicate)
        .map_err(|e| TreeError::invalid_condition(predicate, e.message()))?;
    if !expr.is_binary() {
        return Err(TreeError::invalid_condition(
            predicate,
            "not a binary expression",
        ));
    }
    check_types(&expr).map_err(|reason| TreeError::invalid_condition(predicate, reason))?;
    Ok(expr)
}

/// Rebuild a condition's compiled predicate and branch table from its
/// persisted predicate text and branch list.
pub(crate) fn compile_condition(condition: &mut Condition) -> Result<(), TreeError> {
    let expr = compile_predicate(&condition.predicate)?;
    let mut table = HashMap::with_capacity(condition.branches.len());
    for (index, branch) in condition.branches.iter().enumerate() {
        if table.insert(BranchKey::from(&branch.value), index).is_some() {
            tracing::debug!(
                predicate = %condition.predicate,
                value = %branch.value,
                "branch value overwrites an earlier branch"
            );
        }
    }
    condition.compiled = Some(CompiledPredicate { expr, table });
    Ok(())
}

/// Compile every condition reachable from `root`, breadth first, stopping
/// at the first failure. Returns the number of conditions compiled.
pub(crate) fn initialize(root: Option<&mut Node>) -> Result<usize, TreeError> {
    let Some(Node::Condition(root)) = root else {
        return Ok(0);
    };

    let mut queue: VecDeque<&mut Condition> = VecDeque::from([root]);
    let mut compiled = 0_usize;
    while let Some(condition) = queue.pop_front() {
        compile_condition(condition)?;
        compiled += 1;
        queue.extend(
            condition
                .branches
                .iter_mut()
                .filter_map(|branch| match &mut branch.next {
                    Some(Node::Condition(next)) => Some(next),
                    _ => None,
                }),
        );
    }

    tracing::debug!(conditions = compiled, "tree initialized");
    Ok(compiled)
}

// -- Static operand checks ---------------------------------------------------

/// Operand types knowable without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Number,
    Bool,
    String,
}

impl Kind {
    fn of(value: &Value) -> Kind {
        match value {
            Value::Int(_) | Value::Float(_) => Kind::Number,
            Value::Bool(_) => Kind::Bool,
            Value::String(_) => Kind::String,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Number => "number",
            Kind::Bool => "bool",
            Kind::String => "string",
        }
    }
}

/// Reject operators applied to literal operands they can never accept.
/// Returns the expression's kind when it is known statically.
fn check_types(expr: &Expr) -> Result<Option<Kind>, String> {
    match expr {
        Expr::Literal(value) => Ok(Some(Kind::of(value))),
        Expr::Ident(_) => Ok(None),
        Expr::Unary { op, operand } => {
            let kind = check_types(operand)?;
            let expected = match op {
                UnaryOp::Not => Kind::Bool,
                UnaryOp::Neg => Kind::Number,
            };
            match kind {
                Some(k) if k != expected => Err(format!(
                    "operator '{op}' cannot be applied to {}",
                    k.name()
                )),
                _ => Ok(Some(expected)),
            }
        }
        Expr::Binary { op, left, right } => {
            let l = check_types(left)?;
            let r = check_types(right)?;
            let mismatch = || {
                Err(format!(
                    "operator '{op}' cannot be applied to {} and {}",
                    l.map_or("parameter", Kind::name),
                    r.map_or("parameter", Kind::name),
                ))
            };
            let all = |allowed: &[Kind]| [l, r].iter().flatten().all(|k| allowed.contains(k));
            match op {
                BinaryOp::Or | BinaryOp::And => {
                    if all(&[Kind::Bool]) {
                        Ok(Some(Kind::Bool))
                    } else {
                        mismatch()
                    }
                }
                BinaryOp::Compare(CompareOp::Eq | CompareOp::Neq) => Ok(Some(Kind::Bool)),
                BinaryOp::Compare(_) => match (l, r) {
                    (Some(a), Some(b)) if a != b => mismatch(),
                    _ if all(&[Kind::Number, Kind::String]) => Ok(Some(Kind::Bool)),
                    _ => mismatch(),
                },
                BinaryOp::Add => match (l, r) {
                    (Some(a), Some(b)) if a != b => mismatch(),
                    _ if all(&[Kind::Number, Kind::String]) => Ok(l.or(r)),
                    _ => mismatch(),
                },
                BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                    if all(&[Kind::Number]) {
                        Ok(Some(Kind::Number))
                    } else {
                        mismatch()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Outcome, Params, Tree};

    fn outcome(v: &str) -> Node {
        Node::from(Outcome::new(v).unwrap())
    }

    #[test]
    fn compile_accepts_well_typed_predicates() {
        for text in [
            "salary >= 50000",
            "free_coffee == true",
            "a && b",
            "name + \"x\" == \"ax\"",
            "x * 2 - 1 > y % 3",
            "x == \"str\"",
            "1 == \"1\"",
            "!(a == 1) || b",
            "city < \"M\"",
        ] {
            assert!(compile_predicate(text).is_ok(), "expected ok for {text:?}");
        }
    }

    #[test]
    fn compile_rejects_ill_typed_literals() {
        for text in [
            "\"a\" * 2",
            "1 && true",
            "x || 3",
            "!\"x\" == y",
            "\"a\" < 1",
            "true > false",
            "\"a\" + 1 == b",
            "-\"a\" == b",
        ] {
            assert!(
                matches!(
                    compile_predicate(text),
                    Err(TreeError::InvalidCondition { .. })
                ),
                "expected rejection for {text:?}"
            );
        }
    }

    #[test]
    fn compile_rejects_non_binary() {
        let err = compile_predicate("x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid condition 'x': not a binary expression"
        );
    }

    #[test]
    fn condition_compile_builds_table_last_write_wins() {
        let mut c = Condition::uncompiled(
            "x == 1".into(),
            vec![
                crate::Branch {
                    value: Value::Bool(true),
                    next: Some(outcome("first")),
                },
                crate::Branch {
                    value: Value::Bool(true),
                    next: Some(outcome("second")),
                },
            ],
        );
        c.compile().unwrap();
        let next = c.next(&Params::new().set("x", 1_i64)).unwrap().unwrap();
        assert_eq!(next.as_outcome().unwrap().value(), &Value::from("second"));
    }

    #[test]
    fn condition_compile_is_idempotent() {
        let mut c = Condition::new("x > 1").unwrap().with_branch(true, outcome("yes"));
        c.compile().unwrap();
        c.compile().unwrap();
        assert!(c.next(&Params::new().set("x", 2_i64)).unwrap().is_some());
    }

    #[test]
    fn failed_compile_leaves_condition_unchanged() {
        let mut c = Condition::uncompiled("not valid ==".into(), Vec::new());
        assert!(c.compile().is_err());
        assert!(!c.is_compiled());
    }

    #[test]
    fn initialize_empty_and_outcome_roots() {
        let mut empty = Tree::empty();
        assert!(empty.initialize().is_ok());

        let mut leaf = Tree::new(Outcome::new("always").unwrap());
        assert!(leaf.initialize().is_ok());
    }

    #[test]
    fn initialize_compiles_every_reachable_condition() {
        let inner = Condition::uncompiled(
            "y == 2".into(),
            vec![crate::Branch {
                value: Value::Bool(true),
                next: Some(outcome("deep")),
            }],
        );
        let root = Condition::uncompiled(
            "x == 1".into(),
            vec![crate::Branch {
                value: Value::Bool(true),
                next: Some(Node::from(inner)),
            }],
        );
        let mut tree = Tree::new(root);
        assert!(!tree.is_compiled());
        tree.initialize().unwrap();
        assert!(tree.is_compiled());

        let params = Params::new().set("x", 1_i64).set("y", 2_i64);
        assert_eq!(tree.decide(&params).unwrap(), &Value::from("deep"));
    }

    #[test]
    fn initialize_fails_fast_and_keeps_earlier_work() {
        let bad = Condition::uncompiled("oops".into(), Vec::new());
        let root = Condition::uncompiled(
            "x == 1".into(),
            vec![crate::Branch {
                value: Value::Bool(true),
                next: Some(Node::from(bad)),
            }],
        );
        let mut tree = Tree::new(root);
        let err = tree.initialize().unwrap_err();
        assert!(matches!(err, TreeError::InvalidCondition { predicate, .. } if predicate == "oops"));

        let root = tree.root().and_then(Node::as_condition).unwrap();
        assert!(root.is_compiled());
        assert!(!tree.is_compiled());
    }
}
