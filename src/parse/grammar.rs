use winnow::ascii::digit1;
use winnow::combinator::{alt, cut_err, opt, preceded, repeat, terminated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::{BinaryOp, CompareOp, Expr, UnaryOp, Value};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., char::is_whitespace)
        .void()
        .parse_next(input)
}

// -- Identifiers ------------------------------------------------------------

fn segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// A dotted path such as `user.profile.age`.
fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    let start = *input;
    segment.parse_next(input)?;
    let _: () = repeat(0.., ('.', segment).void()).parse_next(input)?;
    Ok(&start[..start.len() - input.len()])
}

fn ident_or_bool(input: &mut &str) -> ModalResult<Expr> {
    ident
        .map(|name: &str| match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            other => Expr::Ident(other.to_owned()),
        })
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::CharLiteral(quote)))
            .parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' | '\'' | '\\' => s.push(esc),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

/// Integer or decimal literal, with the sign attached directly to the digits.
/// Digit runs too large for `i64` fall back to floats.
fn number(input: &mut &str) -> ModalResult<Value> {
    let text = (opt('-'), digit1, opt(('.', digit1)))
        .take()
        .parse_next(input)?;
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| ErrMode::from_input(input).cut())
}

// -- Operators --------------------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

fn additive_op(input: &mut &str) -> ModalResult<BinaryOp> {
    alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))).parse_next(input)
}

fn multiplicative_op(input: &mut &str) -> ModalResult<BinaryOp> {
    alt((
        '*'.value(BinaryOp::Mul),
        '/'.value(BinaryOp::Div),
        '%'.value(BinaryOp::Rem),
    ))
    .parse_next(input)
}

// -- Expressions (precedence: || < && < compare < +- < */% < unary) ---------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        preceded('(', cut_err(terminated(expr, (ws, ')')))),
        string_literal.map(|s| Expr::Literal(Value::String(s))),
        ident_or_bool,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        number.map(Expr::Literal),
        preceded('!', cut_err(unary)).map(|e| Expr::unary(UnaryOp::Not, e)),
        preceded('-', cut_err(unary)).map(|e| Expr::unary(UnaryOp::Neg, e)),
        primary,
    ))
    .parse_next(input)
}

fn fold_left(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| Expr::binary(op, acc, rhs))
}

fn multiplicative(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<(BinaryOp, Expr)> = repeat(
        0..,
        (preceded(ws, multiplicative_op), cut_err(unary)),
    )
    .parse_next(input)?;
    Ok(fold_left(first, rest))
}

fn additive(input: &mut &str) -> ModalResult<Expr> {
    let first = multiplicative(input)?;
    let rest: Vec<(BinaryOp, Expr)> =
        repeat(0.., (preceded(ws, additive_op), cut_err(multiplicative))).parse_next(input)?;
    Ok(fold_left(first, rest))
}

/// Comparisons do not chain: `a < b < c` is rejected.
fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let left = additive(input)?;
    match opt(preceded(ws, compare_op)).parse_next(input)? {
        Some(op) => {
            let right = cut_err(additive).parse_next(input)?;
            Ok(Expr::binary(BinaryOp::Compare(op), left, right))
        }
        None => Ok(left),
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = comparison(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, "&&"), cut_err(comparison))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::binary(BinaryOp::And, acc, r)))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, "||"), cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::binary(BinaryOp::Or, acc, r)))
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    terminated(expr, ws).parse_next(input)
}

pub fn parse_atom(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    terminated(
        alt((
            number.map(Expr::Literal),
            string_literal.map(|s| Expr::Literal(Value::String(s))),
            ident_or_bool,
        )),
        ws,
    )
    .parse_next(input)
}
