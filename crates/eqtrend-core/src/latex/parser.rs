//! Parser: classified tokens → [`Expr`].
//! The grammar lives in `grammar.lalrpop`; this module holds the builders its
//! actions call and maps grammar errors onto [`ParseError`].

use lalrpop_util::lalrpop_mod;

use super::lexer::{self, Delim, Tok};
use super::ParseError;
use crate::expr::{BinaryOp, Expr, UnaryOp};

lalrpop_mod!(
    #[allow(clippy::all)]
    #[allow(dead_code)]
    #[allow(unused_imports)]
    grammar,
    "/latex/grammar.rs"
);

/// Parse an already cleaned formula.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let toks = lexer::tokens(input)?;
    if toks.is_empty() {
        return Err(ParseError::new(0, "empty formula"));
    }
    grammar::FormulaParser::new()
        .parse(toks)
        .map_err(|e| from_grammar(e, input.len()))
}

fn from_grammar(err: lalrpop_util::ParseError<usize, Tok, ParseError>, end: usize) -> ParseError {
    use lalrpop_util::ParseError as E;
    match err {
        E::InvalidToken { location } => ParseError::new(location, "invalid token"),
        E::UnrecognizedEof { expected, .. } => {
            ParseError::new(end, format!("unexpected end of formula{}", expecting(&expected)))
        }
        E::UnrecognizedToken {
            token: (pos, tok, _),
            expected,
        } => ParseError::new(pos, format!("unexpected {tok:?}{}", expecting(&expected))),
        E::ExtraToken { token: (pos, tok, _) } => {
            ParseError::new(pos, format!("unexpected {tok:?}"))
        }
        E::User { error } => error,
    }
}

fn expecting(expected: &[String]) -> String {
    if expected.is_empty() {
        String::new()
    } else {
        format!(", expected one of {}", expected.join(" "))
    }
}

/// Comma / row separated items; a single item stands alone.
pub fn seq(mut items: Vec<Expr>) -> Expr {
    if items.len() == 1 {
        items.pop().unwrap_or(Expr::Seq(Vec::new()))
    } else {
        Expr::Seq(items)
    }
}

pub fn subscript(base: Expr, index: Expr) -> Expr {
    Expr::Subscript {
        base: Box::new(base),
        index: Box::new(index),
    }
}

/// `\partial u` is the differential of `u`; a scripted operator such as
/// `\nabla^2` multiplies its operand instead.
pub fn differential(op: Expr, operand: Expr) -> Expr {
    match op {
        Expr::Symbol(_) => Expr::unary(UnaryOp::Differential, operand),
        scripted => Expr::binary(BinaryOp::Mul, scripted, operand),
    }
}

/// `\left. \right.` contents; bars turn them into `abs` / `norm`.
pub fn delimited(open: Delim, inner: Expr) -> Expr {
    match open {
        Delim::Plain => inner,
        Delim::Abs => Expr::apply("abs", vec![inner]),
        Delim::Norm => Expr::apply("norm", vec![inner]),
    }
}

/// A named function with the scripts seen before its operand.
pub struct FuncHead {
    name: String,
    power: Option<Expr>,
    base: Option<Expr>,
}

impl FuncHead {
    pub fn new(name: String) -> Self {
        Self {
            name,
            power: None,
            base: None,
        }
    }

    pub fn with_power(mut self, power: Expr) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_base(mut self, base: Expr) -> Self {
        self.base = Some(base);
        self
    }

    /// `\log_2 n` is `(log n 2)`; a power applies to the whole call, so
    /// `\sin^2 x` is `(^ (sin x) 2)`.
    pub fn apply(self, arg: Expr) -> Expr {
        let mut args = vec![arg];
        args.extend(self.base);
        let applied = Expr::apply(self.name, args);
        match self.power {
            Some(p) => Expr::binary(BinaryOp::Pow, applied, p),
            None => applied,
        }
    }
}

/// `\sum`, `\int`, `\lim`, ... with the limits seen so far.
pub struct BigHead {
    name: String,
    lower: Option<Box<Expr>>,
    upper: Option<Box<Expr>>,
}

impl BigHead {
    pub fn new(name: String) -> Self {
        Self {
            name,
            lower: None,
            upper: None,
        }
    }

    pub fn with_lower(mut self, lower: Expr) -> Self {
        self.lower = Some(Box::new(lower));
        self
    }

    pub fn with_upper(mut self, upper: Expr) -> Self {
        self.upper = Some(Box::new(upper));
        self
    }

    pub fn over(self, body: Expr) -> Expr {
        Expr::BigOp {
            name: self.name,
            lower: self.lower,
            upper: self.upper,
            body: Box::new(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_carry_positions() {
        let err = parse("a+").unwrap_err();
        assert_eq!(err.pos, 2);
        assert!(err.message.contains("end of formula"));

        let err = parse("a+)").unwrap_err();
        assert_eq!(err.pos, 2);
        assert!(err.message.contains("RParen"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("  ").unwrap_err().message, "empty formula");
    }

    #[test]
    fn test_differential_builder() {
        let u = Expr::symbol("u");
        assert_eq!(
            differential(Expr::symbol("partial"), u.clone()).to_string(),
            "(d u)"
        );
        let nabla2 = Expr::binary(BinaryOp::Pow, Expr::symbol("nabla"), Expr::Number("2".into()));
        assert_eq!(differential(nabla2, u).to_string(), "(* (^ nabla 2) u)");
    }

    #[test]
    fn test_func_head_keeps_base_after_operand() {
        let e = FuncHead::new("log".into())
            .with_base(Expr::Number("2".into()))
            .apply(Expr::symbol("n"));
        assert_eq!(e.to_string(), "(log n 2)");
    }
}
