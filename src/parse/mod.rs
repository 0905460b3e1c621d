//! Predicate and outcome expression grammar.

mod error;
mod grammar;

pub use error::ParseError;

use crate::Expr;

/// Parse an expression string into an [`Expr`].
///
/// The whole input must form one expression; surrounding whitespace is
/// ignored.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::parse_expr
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

/// Parse a single literal or identifier token.
///
/// Unlike [`parse`], grouping is not accepted: `(x)` is an error.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is anything but one token.
pub fn parse_atom(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::parse_atom
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
