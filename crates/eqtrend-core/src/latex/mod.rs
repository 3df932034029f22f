//! LaTeX → [`Expr`]: regex clean-up, a classifying lexer and an LALRPOP
//! grammar.

pub mod clean;
pub mod lexer;
pub mod parser;

use std::fmt;

use crate::expr::Expr;

pub use clean::{clean, strip_decoration, strip_display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the cleaned formula.
    pub pos: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: usize, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse an already cleaned formula.
pub fn parse_cleaned(latex: &str) -> Result<Expr, ParseError> {
    parser::parse(latex)
}

/// Clean a raw alttext formula and parse it.
pub fn parse_latex(raw: &str) -> Result<Expr, ParseError> {
    parse_cleaned(&clean(raw))
}
