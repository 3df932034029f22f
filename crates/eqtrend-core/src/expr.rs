//! Expression trees produced by the LaTeX grammar, and the structural
//! metrics computed over them.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(String),
    Symbol(String),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Relation {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `x_i`: a name with an index, not an operation.
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Named functions (`\sin`, `\sqrt`, `abs`, ...) applied to arguments.
    Apply {
        func: String,
        args: Vec<Expr>,
    },
    /// `\sum`, `\int`, `\lim`, ... with optional limits and a body.
    BigOp {
        name: String,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    /// Comma / row separated items.
    Seq(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    PlusMinus,
    Factorial,
    Prime,
    /// `\partial x`, `\nabla f`, `d x` style differential operators.
    Differential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    PlusMinus,
    Mul,
    Div,
    Pow,
    Cross,
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Pos => "pos",
            Self::PlusMinus => "pm",
            Self::Factorial => "factorial",
            Self::Prime => "prime",
            Self::Differential => "d",
        }
    }
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::PlusMinus => "pm",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Cross => "cross",
        }
    }
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        Self::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn apply(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Apply {
            func: func.into(),
            args,
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Number(_) | Self::Symbol(_) => Vec::new(),
            Self::Unary { arg, .. } => vec![arg.as_ref()],
            Self::Binary { lhs, rhs, .. } | Self::Relation { lhs, rhs, .. } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            Self::Subscript { base, index } => vec![base.as_ref(), index.as_ref()],
            Self::Apply { args, .. } => args.iter().collect(),
            Self::BigOp {
                lower, upper, body, ..
            } => lower
                .iter()
                .chain(upper.iter())
                .map(|b| b.as_ref())
                .chain(std::iter::once(body.as_ref()))
                .collect(),
            Self::Seq(items) => items.iter().collect(),
        }
    }

    /// Number of operator applications. Subscripts and sequences are
    /// structure, not operations.
    pub fn count_ops(&self) -> u32 {
        let own = match self {
            Self::Number(_) | Self::Symbol(_) | Self::Subscript { .. } | Self::Seq(_) => 0,
            _ => 1,
        };
        own + self.children().iter().map(|c| c.count_ops()).sum::<u32>()
    }

    /// Leaves have depth 1.
    pub fn depth(&self) -> u32 {
        1 + self
            .children()
            .iter()
            .map(|c| c.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> u32 {
        1 + self.children().iter().map(|c| c.node_count()).sum::<u32>()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Unary { op, arg } => write!(f, "({} {arg})", op.symbol()),
            Self::Binary { op, lhs, rhs } => write!(f, "({} {lhs} {rhs})", op.symbol()),
            Self::Relation { op, lhs, rhs } => write!(f, "({op} {lhs} {rhs})"),
            Self::Subscript { base, index } => write!(f, "{base}_{index}"),
            Self::Apply { func, args } => {
                write!(f, "({func}")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                write!(f, ")")
            }
            Self::BigOp {
                name,
                lower,
                upper,
                body,
            } => {
                write!(f, "({name}")?;
                if let Some(l) = lower {
                    write!(f, " _{l}")?;
                }
                if let Some(u) = upper {
                    write!(f, " ^{u}")?;
                }
                write!(f, " {body})")
            }
            Self::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Expr {
        Expr::symbol(s)
    }

    #[test]
    fn test_leaf_metrics() {
        let x = sym("x");
        assert_eq!(x.count_ops(), 0);
        assert_eq!(x.depth(), 1);
        assert_eq!(x.node_count(), 1);
    }

    #[test]
    fn test_mass_energy_metrics() {
        // E = m c^2
        let e = Expr::Relation {
            op: "=".into(),
            lhs: Box::new(sym("E")),
            rhs: Box::new(Expr::binary(
                BinaryOp::Mul,
                sym("m"),
                Expr::binary(BinaryOp::Pow, sym("c"), Expr::Number("2".into())),
            )),
        };
        assert_eq!(e.count_ops(), 3);
        assert_eq!(e.depth(), 4);
        assert_eq!(e.node_count(), 7);
        assert_eq!(e.to_string(), "(= E (* m (^ c 2)))");
    }

    #[test]
    fn test_subscript_is_not_an_op() {
        let e = Expr::Subscript {
            base: Box::new(sym("x")),
            index: Box::new(sym("i")),
        };
        assert_eq!(e.count_ops(), 0);
        assert_eq!(e.node_count(), 3);
        assert_eq!(e.to_string(), "x_i");
    }

    #[test]
    fn test_bigop_children_order() {
        let e = Expr::BigOp {
            name: "sum".into(),
            lower: Some(Box::new(sym("i"))),
            upper: Some(Box::new(sym("n"))),
            body: Box::new(sym("a")),
        };
        let kids: Vec<String> = e.children().iter().map(|c| c.to_string()).collect();
        assert_eq!(kids, ["i", "n", "a"]);
        assert_eq!(e.count_ops(), 1);
        assert_eq!(e.to_string(), "(sum _i ^n a)");
    }

    #[test]
    fn test_seq_sums_children() {
        let e = Expr::Seq(vec![
            Expr::binary(BinaryOp::Add, sym("a"), sym("b")),
            Expr::unary(UnaryOp::Neg, sym("c")),
        ]);
        assert_eq!(e.count_ops(), 2);
        assert_eq!(e.depth(), 3);
        assert_eq!(e.to_string(), "[(+ a b), (neg c)]");
    }
}
