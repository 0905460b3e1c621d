use std::time::Instant;

use crate::{
    BinaryOp, CompareOp, DecisionReport, DecisionStep, EvalError, Expr, Node, Params, TreeError,
    UnaryOp, Value,
};

/// Walk from `root` to an outcome, calling `on_step` with each condition's
/// predicate and result.
pub(crate) fn decide<'a>(
    root: Option<&'a Node>,
    params: &Params,
    mut on_step: impl FnMut(&str, &Value),
) -> Result<&'a Value, TreeError> {
    let mut node = root;
    loop {
        match node {
            Some(Node::Outcome(outcome)) => return Ok(outcome.value()),
            Some(Node::Condition(condition)) => {
                let (value, next) = condition.select(params)?;
                tracing::trace!(predicate = %condition.predicate(), value = %value, "decision step");
                on_step(condition.predicate(), &value);
                node = next;
            }
            None => {
                tracing::debug!("decision reached an empty node");
                return Err(TreeError::Undecidable);
            }
        }
    }
}

pub(crate) fn decide_detailed(
    root: Option<&Node>,
    params: &Params,
) -> Result<DecisionReport, TreeError> {
    let start = Instant::now();
    let mut path = Vec::new();
    let outcome = decide(root, params, |predicate, value| {
        path.push(DecisionStep::new(predicate, value.clone()));
    })?
    .clone();
    Ok(DecisionReport::new(outcome, path, start.elapsed()))
}

/// Evaluate an expression against parameters.
pub(crate) fn eval_expr(expr: &Expr, params: &Params) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::MissingParameter { name: name.clone() }),
        Expr::Unary { op, operand } => eval_unary(*op, eval_expr(operand, params)?),
        Expr::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
            left,
            right,
        } => eval_logical(*op, left, right, params),
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, params)?;
            let r = eval_expr(right, params)?;
            eval_binary(*op, &l, &r)
        }
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        // -i64::MIN does not fit; report it as the subtraction `0 - x` it is.
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or(EvalError::Overflow { op: BinaryOp::Sub }),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (op, other) => Err(EvalError::UnaryTypeMismatch {
            op,
            operand: other.type_name(),
        }),
    }
}

/// `&&` and `||`, short-circuiting on the left operand.
fn eval_logical(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    params: &Params,
) -> Result<Value, EvalError> {
    let l = eval_expr(left, params)?;
    let Some(l) = l.as_bool() else {
        let r = eval_expr(right, params)?;
        return Err(EvalError::TypeMismatch {
            op,
            left: l.type_name(),
            right: r.type_name(),
        });
    };
    match (op, l) {
        (BinaryOp::And, false) => return Ok(Value::Bool(false)),
        (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
        _ => {}
    }
    let r = eval_expr(right, params)?;
    r.as_bool().map(Value::Bool).ok_or(EvalError::TypeMismatch {
        op,
        left: "bool",
        right: r.type_name(),
    })
}

fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op,
        left: l.type_name(),
        right: r.type_name(),
    };
    match op {
        BinaryOp::Compare(cmp @ (CompareOp::Eq | CompareOp::Neq)) => Ok(Value::Bool(
            l.compare(cmp, r).unwrap_or(cmp == CompareOp::Neq),
        )),
        BinaryOp::Compare(cmp) => match (l, r) {
            (Value::Bool(_), _) | (_, Value::Bool(_)) => Err(mismatch()),
            _ => l.compare(cmp, r).map(Value::Bool).ok_or_else(mismatch),
        },
        BinaryOp::Add => match (l, r) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => arithmetic(op, l, r, i64::checked_add, |a, b| a + b).ok_or_else(mismatch)?,
        },
        BinaryOp::Sub => {
            arithmetic(op, l, r, i64::checked_sub, |a, b| a - b).ok_or_else(mismatch)?
        }
        BinaryOp::Mul => {
            arithmetic(op, l, r, i64::checked_mul, |a, b| a * b).ok_or_else(mismatch)?
        }
        BinaryOp::Div => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(mismatch());
            };
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        BinaryOp::Rem => {
            if r.as_f64() == Some(0.0) && l.is_numeric() {
                return Err(EvalError::DivisionByZero);
            }
            arithmetic(op, l, r, i64::checked_rem, |a, b| a % b).ok_or_else(mismatch)?
        }
        BinaryOp::And | BinaryOp::Or => Err(mismatch()),
    }
}

/// Numeric arithmetic. Two ints use the checked integer op; any float
/// promotes both sides. Returns `None` when either side is not a number.
fn arithmetic(
    op: BinaryOp,
    l: &Value,
    r: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Result<Value, EvalError>> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(
            int_op(*a, *b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow { op }),
        ),
        _ => {
            let (a, b) = (l.as_f64()?, r.as_f64()?);
            Some(Ok(Value::Float(float_op(a, b))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str, params: &Params) -> Result<Value, EvalError> {
        eval_expr(&crate::parse::parse(text).unwrap(), params)
    }

    fn eval_ok(text: &str) -> Value {
        eval(text, &Params::new()).unwrap()
    }

    #[test]
    fn eval_comparisons() {
        let params = Params::new().set("x", 10_i64);
        for (text, expected) in [
            ("x == 10", true),
            ("x != 10", false),
            ("x > 5", true),
            ("x >= 10", true),
            ("x >= 11", false),
            ("x < 20", true),
            ("x <= 10", true),
            ("x <= 9", false),
            ("x == 10.0", true),
        ] {
            assert_eq!(
                eval(text, &params).unwrap(),
                Value::Bool(expected),
                "failed for {text}"
            );
        }
    }

    #[test]
    fn eval_string_ordering() {
        assert_eq!(eval_ok("\"apple\" < \"banana\""), Value::Bool(true));
        assert_eq!(eval_ok("\"b\" >= \"a\""), Value::Bool(true));
    }

    #[test]
    fn eval_equality_across_types() {
        assert_eq!(eval_ok("1 == \"1\""), Value::Bool(false));
        assert_eq!(eval_ok("1 != \"1\""), Value::Bool(true));
        assert_eq!(eval_ok("true == 1"), Value::Bool(false));
    }

    #[test]
    fn eval_ordering_type_mismatch() {
        let params = Params::new().set("s", "text");
        assert_eq!(
            eval("s > 1", &params),
            Err(EvalError::TypeMismatch {
                op: BinaryOp::Compare(CompareOp::Gt),
                left: "string",
                right: "int",
            })
        );
        let params = Params::new().set("b", true);
        assert!(matches!(
            eval("b < true", &params),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn eval_missing_parameter() {
        assert_eq!(
            eval("salary >= 1", &Params::new()),
            Err(EvalError::MissingParameter {
                name: "salary".into()
            })
        );
    }

    #[test]
    fn eval_nested_parameter() {
        let params = Params::new().set("user.age", 30_i64);
        assert_eq!(eval("user.age > 18", &params).unwrap(), Value::Bool(true));
    }

    #[test]
    fn eval_logic_short_circuits() {
        let params = Params::new().set("a", false).set("b", true);
        // `missing` is never looked up.
        assert_eq!(eval("a && missing", &params).unwrap(), Value::Bool(false));
        assert_eq!(eval("b || missing", &params).unwrap(), Value::Bool(true));
        assert!(matches!(
            eval("b && missing", &params),
            Err(EvalError::MissingParameter { .. })
        ));
    }

    #[test]
    fn eval_logic_requires_bools() {
        let params = Params::new().set("n", 1_i64).set("b", true);
        assert_eq!(
            eval("n && b", &params),
            Err(EvalError::TypeMismatch {
                op: BinaryOp::And,
                left: "int",
                right: "bool",
            })
        );
        assert_eq!(
            eval("b && n", &params),
            Err(EvalError::TypeMismatch {
                op: BinaryOp::And,
                left: "bool",
                right: "int",
            })
        );
    }

    #[test]
    fn eval_unary() {
        let params = Params::new().set("b", false).set("n", 4_i64).set("s", "x");
        assert_eq!(eval("!b == true", &params).unwrap(), Value::Bool(true));
        assert_eq!(eval("-n + 1", &params).unwrap(), Value::Int(-3));
        assert_eq!(
            eval("!s == true", &params),
            Err(EvalError::UnaryTypeMismatch {
                op: UnaryOp::Not,
                operand: "string",
            })
        );
    }

    #[test]
    fn eval_arithmetic() {
        assert_eq!(eval_ok("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval_ok("10 - 4 - 3"), Value::Int(3));
        assert_eq!(eval_ok("7 % 3"), Value::Int(1));
        assert_eq!(eval_ok("1 + 0.5"), Value::Float(1.5));
        assert_eq!(eval_ok("7 / 2"), Value::Float(3.5));
        assert_eq!(eval_ok("6 / 3"), Value::Float(2.0));
        assert_eq!(eval_ok("\"ab\" + \"cd\""), Value::String("abcd".into()));
    }

    #[test]
    fn eval_division_by_zero() {
        let params = Params::new().set("z", 0_i64).set("f", 0.0);
        assert_eq!(eval("1 / z", &params), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 % z", &params), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1.5 % f", &params), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn eval_overflow_is_checked() {
        let params = Params::new().set("big", i64::MAX).set("min", i64::MIN);
        assert_eq!(
            eval("big + 1", &params),
            Err(EvalError::Overflow { op: BinaryOp::Add })
        );
        assert_eq!(
            eval("big * 2", &params),
            Err(EvalError::Overflow { op: BinaryOp::Mul })
        );
        assert_eq!(
            eval("-min", &params),
            Err(EvalError::Overflow { op: BinaryOp::Sub })
        );
        assert_eq!(
            eval("min % -1", &params),
            Err(EvalError::Overflow { op: BinaryOp::Rem })
        );
    }

    #[test]
    fn eval_arithmetic_type_mismatch() {
        let params = Params::new().set("s", "a").set("b", true);
        assert!(matches!(
            eval("s * 2", &params),
            Err(EvalError::TypeMismatch { op: BinaryOp::Mul, .. })
        ));
        assert!(matches!(
            eval("s + 1", &params),
            Err(EvalError::TypeMismatch { op: BinaryOp::Add, .. })
        ));
        assert!(matches!(
            eval("b - 1", &params),
            Err(EvalError::TypeMismatch { op: BinaryOp::Sub, .. })
        ));
    }

    #[test]
    fn decide_records_path() {
        let tree = crate::Tree::new(
            crate::Condition::new("x > 1")
                .unwrap()
                .with_branch(true, Node::from(crate::Outcome::new("big").unwrap())),
        );
        let report = decide_detailed(tree.root(), &Params::new().set("x", 2_i64)).unwrap();
        assert_eq!(report.outcome(), &Value::from("big"));
        assert_eq!(report.path().len(), 1);
        assert_eq!(report.path()[0].predicate(), "x > 1");
        assert_eq!(report.path()[0].value(), &Value::Bool(true));
    }

    #[test]
    fn decide_empty_root_is_undecidable() {
        assert!(matches!(
            decide(None, &Params::new(), |_, _| {}),
            Err(TreeError::Undecidable)
        ));
    }
}
