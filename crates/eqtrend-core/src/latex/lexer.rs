//! Tokenizer for the math subset of LaTeX that shows up in alttext.
//!
//! Two passes: [`scan`] splits the formula into lexemes, [`tokens`] turns
//! them into grammar tokens. The second pass settles everything the grammar
//! cannot see locally: whether a `|` opens or closes, what `\left` wraps,
//! whether `\sin` has an operand, and TeX's one-token macro arguments.

use super::ParseError;
use crate::expr::BinaryOp;

/// Longer formulas are rejected before parsing.
pub const MAX_TOKENS: usize = 2048;
/// Maximum depth of open groups, bars and `\left` pairs.
pub const MAX_NESTING: usize = 128;

/// Token with its start and end byte offsets.
pub type Spanned<T> = (usize, T, usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Num(String),
    Letter(char),
    /// `\name`, or `\X` for a single non-letter X (`\|`).
    Cmd(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Caret,
    Underscore,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Prime,
    Pipe,
    Comma,
    Semicolon,
    Colon,
    Dot,
    /// `=`, `<`, `>` and their unicode cousins, stored as LaTeX names.
    Rel(String),
    /// `\\`
    RowSep,
}

/// What a `\left` delimiter makes of its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    Plain,
    Abs,
    Norm,
}

/// Grammar terminals.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(String),
    /// Letters, Greek and other symbol commands, `\text{..}` contents, and
    /// functions or differentials used without an operand.
    Ident(String),
    /// Named function followed by its operand.
    Func(String),
    /// `\partial` / `\nabla` followed by an operand.
    Partial(String),
    BigOp(String),
    Frac,
    Sqrt,
    /// `[` opening the index of `\sqrt[n]`.
    RootOpen,
    Decoration,
    Accent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    AbsOpen,
    AbsClose,
    NormOpen,
    NormClose,
    Left(Delim),
    Right,
    Caret,
    Underscore,
    Bang,
    Prime,
    Plus,
    Minus,
    PlusMinus,
    MulOp(BinaryOp),
    Rel(String),
    Sep,
}

const RELATIONS: &[&str] = &[
    "le", "leq", "ge", "geq", "ne", "neq", "approx", "equiv", "sim", "simeq", "cong", "propto",
    "to", "rightarrow", "leftarrow", "Rightarrow", "Leftarrow", "leftrightarrow",
    "Leftrightarrow", "iff", "implies", "mapsto", "ll", "gg", "in", "notin", "subset",
    "subseteq", "supset", "supseteq", "perp", "parallel", "doteq", "leqslant", "geqslant",
    "lesssim", "gtrsim", "triangleq",
];

const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "sinh", "cosh", "tanh", "coth", "arcsin",
    "arccos", "arctan", "log", "ln", "lg", "exp", "det", "max", "min", "gcd", "arg", "deg",
    "dim", "ker", "Pr", "sup", "inf", "hom", "sgn", "erf", "Re", "Im", "tr", "Tr", "grad",
    "curl", "rot",
];

const BIG_OPS: &[&str] = &[
    "sum", "prod", "coprod", "int", "iint", "iiint", "oint", "oiint", "lim", "limsup",
    "liminf", "bigcup", "bigcap", "bigoplus", "bigotimes",
];

/// Commands that only decorate their argument.
const DECORATIONS: &[&str] = &[
    "vec", "hat", "bar", "overline", "underline", "widehat", "check", "breve", "acute",
    "grave", "overrightarrow", "mathbf", "boldsymbol", "mathrm", "mathcal", "mathit",
    "mathbb", "mathsf", "mathfrak", "mathscr", "bm", "pmb",
];

/// Newton-style derivative accents.
const DERIVATIVE_ACCENTS: &[&str] = &["dot", "ddot", "dddot"];

const TEXT_COMMANDS: &[&str] = &["text", "textrm", "textit", "textbf", "mbox", "operatorname"];

const FRACTIONS: &[&str] = &["frac", "dfrac", "tfrac", "cfrac"];

const SYMBOLS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "varkappa", "lambda", "mu", "nu", "xi", "pi", "varpi", "rho",
    "varrho", "sigma", "varsigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega",
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi",
    "Omega", "hbar", "infty", "ell", "imath", "jmath", "aleph", "emptyset", "varnothing",
    "dagger", "ddagger", "star", "circ", "prime", "ldots", "cdots", "dots", "vdots", "ddots",
    "Box", "square", "angle", "degree", "forall", "exists", "hslash", "wp",
];

/// Delimiter commands allowed right after `\left` / `\right`.
const DELIMITER_COMMANDS: &[&str] = &[
    "|", "Vert", "vert", "lvert", "rvert", "lVert", "rVert", "langle", "rangle", "lbrace",
    "rbrace", "lfloor", "rfloor", "lceil", "rceil",
];

pub fn scan(input: &str) -> Result<Vec<Spanned<Lexeme>>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let at = |k: usize| chars.get(k).map(|&(p, _)| p).unwrap_or(input.len());
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() || c == '~' || c == '&' {
            i += 1;
            continue;
        }

        if c == '\\' {
            let Some(&(_, next)) = chars.get(i + 1) else {
                return Err(ParseError::new(pos, "dangling backslash"));
            };
            if next.is_ascii_alphabetic() {
                let mut j = i + 1;
                while chars.get(j).is_some_and(|&(_, ch)| ch.is_ascii_alphabetic()) {
                    j += 1;
                }
                out.push((pos, Lexeme::Cmd(input[at(i + 1)..at(j)].to_string()), at(j)));
                i = j;
            } else {
                match next {
                    '\\' => out.push((pos, Lexeme::RowSep, at(i + 2))),
                    ' ' => {}
                    other => out.push((pos, Lexeme::Cmd(other.to_string()), at(i + 2))),
                }
                i += 2;
            }
            continue;
        }

        let starts_number = c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|&(_, n)| n.is_ascii_digit()));
        if starts_number {
            let mut j = i;
            let mut seen_dot = false;
            while let Some(&(_, ch)) = chars.get(j) {
                let digit_dot = ch == '.'
                    && !seen_dot
                    && chars.get(j + 1).is_some_and(|&(_, n)| n.is_ascii_digit());
                if !ch.is_ascii_digit() && !digit_dot {
                    break;
                }
                seen_dot |= digit_dot;
                j += 1;
            }
            out.push((pos, Lexeme::Num(input[pos..at(j)].to_string()), at(j)));
            i = j;
            continue;
        }

        let lexeme = match c {
            '{' => Lexeme::LBrace,
            '}' => Lexeme::RBrace,
            '(' => Lexeme::LParen,
            ')' => Lexeme::RParen,
            '[' => Lexeme::LBracket,
            ']' => Lexeme::RBracket,
            '^' => Lexeme::Caret,
            '_' => Lexeme::Underscore,
            '+' => Lexeme::Plus,
            '-' | '−' => Lexeme::Minus,
            '*' => Lexeme::Star,
            '/' => Lexeme::Slash,
            '!' => Lexeme::Bang,
            '\'' | '′' => Lexeme::Prime,
            '|' => Lexeme::Pipe,
            ',' => Lexeme::Comma,
            ';' => Lexeme::Semicolon,
            ':' => Lexeme::Colon,
            '.' => Lexeme::Dot,
            '=' | '<' | '>' => Lexeme::Rel(c.to_string()),
            '≤' => Lexeme::Rel("le".into()),
            '≥' => Lexeme::Rel("ge".into()),
            '≠' => Lexeme::Rel("ne".into()),
            '≈' => Lexeme::Rel("approx".into()),
            '×' => Lexeme::Cmd("times".into()),
            '·' | '⋅' => Lexeme::Cmd("cdot".into()),
            '±' => Lexeme::Cmd("pm".into()),
            '∂' => Lexeme::Cmd("partial".into()),
            '∇' => Lexeme::Cmd("nabla".into()),
            '∞' => Lexeme::Cmd("infty".into()),
            '…' => Lexeme::Cmd("ldots".into()),
            ch if ch.is_alphabetic() => Lexeme::Letter(ch),
            other => {
                return Err(ParseError::new(pos, format!("unexpected character '{other}'")));
            }
        };
        out.push((pos, lexeme, at(i + 1)));
        i += 1;
    }

    Ok(out)
}

/// Something still open at the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    /// Braces, parentheses, brackets, `\left`. `resume` is the number of
    /// one-token arguments still owed once the group closes.
    Group { resume: u8 },
    Abs,
    Norm,
}

/// Scan and classify a cleaned formula.
pub fn tokens(input: &str) -> Result<Vec<Spanned<Tok>>, ParseError> {
    let lex = scan(input)?;
    if lex.len() > MAX_TOKENS {
        return Err(ParseError::new(
            0,
            format!("formula too long ({} tokens, limit {MAX_TOKENS})", lex.len()),
        ));
    }
    Classifier {
        lex: &lex,
        out: Vec::with_capacity(lex.len()),
        open: Vec::new(),
        pending_args: 0,
    }
    .run()
}

struct Classifier<'a> {
    lex: &'a [Spanned<Lexeme>],
    out: Vec<Spanned<Tok>>,
    open: Vec<Open>,
    /// One-token macro arguments still expected (`x^23` is `x^{2}3`).
    pending_args: u8,
}

impl Classifier<'_> {
    fn run(mut self) -> Result<Vec<Spanned<Tok>>, ParseError> {
        let lex = self.lex;
        let mut i = 0;
        while let Some((start, lexeme, end)) = lex.get(i) {
            let (start, end) = (*start, *end);
            i += 1;
            let tok = match lexeme {
                Lexeme::Num(n) => {
                    self.number(start, n);
                    continue;
                }
                Lexeme::Letter(c) => {
                    self.took_arg();
                    Tok::Ident(c.to_string())
                }
                Lexeme::Cmd(name) => match self.command(name, start, &mut i)? {
                    Some(tok) => tok,
                    None => continue,
                },
                Lexeme::LBrace => {
                    self.push_group(start)?;
                    Tok::LBrace
                }
                Lexeme::LParen => {
                    self.push_group(start)?;
                    Tok::LParen
                }
                Lexeme::LBracket => {
                    self.push_group(start)?;
                    Tok::LBracket
                }
                Lexeme::RBrace => {
                    self.pop_group();
                    Tok::RBrace
                }
                Lexeme::RParen => {
                    self.pop_group();
                    Tok::RParen
                }
                Lexeme::RBracket => {
                    self.pop_group();
                    Tok::RBracket
                }
                Lexeme::Pipe => self.bar(Open::Abs, start)?,
                Lexeme::Caret => {
                    self.pending_args = 1;
                    Tok::Caret
                }
                Lexeme::Underscore => {
                    self.pending_args = 1;
                    Tok::Underscore
                }
                // a sign keeps the argument slot open: `x^-1`
                Lexeme::Minus => Tok::Minus,
                Lexeme::Plus => self.operator(Tok::Plus),
                Lexeme::Star => self.operator(Tok::MulOp(BinaryOp::Mul)),
                Lexeme::Slash => self.operator(Tok::MulOp(BinaryOp::Div)),
                Lexeme::Bang => self.operator(Tok::Bang),
                Lexeme::Prime => {
                    self.took_arg();
                    Tok::Prime
                }
                Lexeme::Comma | Lexeme::Semicolon | Lexeme::RowSep => self.operator(Tok::Sep),
                Lexeme::Colon => {
                    if let Some((_, Lexeme::Rel(r), rel_end)) = lex.get(i) {
                        if r == "=" {
                            i += 1;
                            self.pending_args = 0;
                            self.out.push((start, Tok::Rel(":=".into()), *rel_end));
                            continue;
                        }
                    }
                    self.operator(Tok::Rel(":".into()))
                }
                Lexeme::Rel(r) => self.operator(Tok::Rel(r.clone())),
                Lexeme::Dot => return Err(ParseError::new(start, "unexpected '.'")),
            };
            self.out.push((start, tok, end));
        }
        Ok(self.out)
    }

    fn took_arg(&mut self) {
        self.pending_args = self.pending_args.saturating_sub(1);
    }

    fn operator(&mut self, tok: Tok) -> Tok {
        self.pending_args = 0;
        tok
    }

    fn push(&mut self, open: Open, pos: usize) -> Result<(), ParseError> {
        if self.open.len() >= MAX_NESTING {
            return Err(ParseError::new(pos, "formula nested too deeply"));
        }
        self.open.push(open);
        Ok(())
    }

    fn push_group(&mut self, pos: usize) -> Result<(), ParseError> {
        let resume = self.pending_args.saturating_sub(1);
        self.pending_args = 0;
        self.push(Open::Group { resume }, pos)
    }

    /// Close the innermost group. Bars left open inside it go with it; the
    /// grammar reports them.
    fn pop_group(&mut self) {
        while let Some(open) = self.open.pop() {
            if let Open::Group { resume } = open {
                self.pending_args = resume;
                return;
            }
        }
        self.pending_args = 0;
    }

    /// `|` and `\|`: close the innermost bar of the same kind, else open one.
    fn bar(&mut self, kind: Open, pos: usize) -> Result<Tok, ParseError> {
        let (open_tok, close_tok) = match kind {
            Open::Norm => (Tok::NormOpen, Tok::NormClose),
            _ => (Tok::AbsOpen, Tok::AbsClose),
        };
        if self.open.last() == Some(&kind) {
            self.open.pop();
            self.took_arg();
            return Ok(close_tok);
        }
        self.pending_args = 0;
        self.push(kind, pos)?;
        Ok(open_tok)
    }

    /// Multi-digit numbers in argument position only give up their first
    /// digit, as in TeX.
    fn number(&mut self, start: usize, n: &str) {
        let mut rest = n;
        let mut at = start;
        while self.pending_args > 0 && rest.len() > 1 {
            let (head, tail) = rest.split_at(1);
            self.out.push((at, Tok::Num(head.to_string()), at + 1));
            self.pending_args -= 1;
            rest = tail;
            at += 1;
        }
        self.took_arg();
        self.out.push((at, Tok::Num(rest.to_string()), at + rest.len()));
    }

    /// The lexeme after `i` if it is a `\left` / `\right` delimiter.
    fn delimiter(&self, i: usize) -> Option<Delim> {
        match &self.lex.get(i)?.1 {
            Lexeme::Pipe => Some(Delim::Abs),
            Lexeme::Cmd(d) if d == "|" || d == "Vert" => Some(Delim::Norm),
            Lexeme::Cmd(d) if DELIMITER_COMMANDS.contains(&d.as_str()) => Some(Delim::Plain),
            Lexeme::LParen
            | Lexeme::RParen
            | Lexeme::LBracket
            | Lexeme::RBracket
            | Lexeme::Dot
            | Lexeme::Slash => Some(Delim::Plain),
            _ => None,
        }
    }

    /// Classify a command. `i` points past it and moves over anything the
    /// command swallows. `None` means the command produces no token.
    fn command(
        &mut self,
        name: &str,
        start: usize,
        i: &mut usize,
    ) -> Result<Option<Tok>, ParseError> {
        let tok = match name {
            "left" => {
                // escaped braces are gone after cleaning, so `\left\{` has no delimiter left
                let delim = self.delimiter(*i);
                if delim.is_some() {
                    *i += 1;
                }
                self.push_group(start)?;
                Tok::Left(delim.unwrap_or(Delim::Plain))
            }
            "right" => {
                if self.delimiter(*i).is_some() {
                    *i += 1;
                }
                self.pop_group();
                Tok::Right
            }
            "|" => self.bar(Open::Norm, start)?,
            "limits" | "nolimits" => return Ok(None),
            "pm" | "mp" => self.operator(Tok::PlusMinus),
            "cdot" | "ast" | "bullet" => self.operator(Tok::MulOp(BinaryOp::Mul)),
            "div" => self.operator(Tok::MulOp(BinaryOp::Div)),
            "times" | "wedge" | "otimes" => self.operator(Tok::MulOp(BinaryOp::Cross)),
            n if FRACTIONS.contains(&n) => {
                self.pending_args = 2;
                Tok::Frac
            }
            "sqrt" => {
                if matches!(self.lex.get(*i), Some((_, Lexeme::LBracket, _))) {
                    let (b_start, b_end) = (self.lex[*i].0, self.lex[*i].2);
                    *i += 1;
                    self.out.push((start, Tok::Sqrt, b_start));
                    self.pending_args = 2;
                    self.push_group(b_start)?;
                    self.out.push((b_start, Tok::RootOpen, b_end));
                    return Ok(None);
                }
                self.pending_args = 1;
                Tok::Sqrt
            }
            n if DECORATIONS.contains(&n) => {
                self.pending_args = 1;
                Tok::Decoration
            }
            n if DERIVATIVE_ACCENTS.contains(&n) => {
                self.pending_args = 1;
                Tok::Accent
            }
            n if TEXT_COMMANDS.contains(&n) => {
                let text = self.text(start, i)?;
                self.took_arg();
                Tok::Ident(text)
            }
            n if BIG_OPS.contains(&n) => self.operator(Tok::BigOp(n.to_string())),
            n if FUNCTIONS.contains(&n) || n == "partial" || n == "nabla" => {
                // an argument of another macro never takes an operand itself
                let applied = self.pending_args == 0 && self.has_operand(*i);
                self.took_arg();
                match (applied, n) {
                    (false, _) => Tok::Ident(n.to_string()),
                    (true, "partial" | "nabla") => Tok::Partial(n.to_string()),
                    (true, _) => Tok::Func(n.to_string()),
                }
            }
            n if SYMBOLS.contains(&n) => {
                self.took_arg();
                Tok::Ident(n.to_string())
            }
            n if RELATIONS.contains(&n) => self.operator(Tok::Rel(n.to_string())),
            other => {
                return Err(ParseError::new(start, format!("unsupported command \\{other}")));
            }
        };
        Ok(Some(tok))
    }

    /// `\text{...}` contents as one name. Whitespace is already gone.
    fn text(&self, start: usize, i: &mut usize) -> Result<String, ParseError> {
        if !matches!(self.lex.get(*i), Some((_, Lexeme::LBrace, _))) {
            return Err(ParseError::new(start, "expected '{' after text command"));
        }
        *i += 1;
        let mut depth = 1usize;
        let mut text = String::new();
        while let Some((_, lexeme, _)) = self.lex.get(*i) {
            *i += 1;
            match lexeme {
                Lexeme::LBrace => depth += 1,
                Lexeme::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                Lexeme::Letter(c) => text.push(*c),
                Lexeme::Num(n) | Lexeme::Cmd(n) => text.push_str(n),
                _ => {}
            }
        }
        Err(ParseError::new(start, "unterminated \\text"))
    }

    /// Whether the lexemes from `i` on, after any `^`/`_` scripts, start an
    /// operand for a function or differential.
    fn has_operand(&self, mut i: usize) -> bool {
        let kind = |k: usize| self.lex.get(k).map(|(_, l, _)| l);
        while matches!(kind(i), Some(Lexeme::Caret | Lexeme::Underscore)) {
            i += 1;
            while matches!(kind(i), Some(Lexeme::Minus)) {
                i += 1;
            }
            match kind(i) {
                Some(Lexeme::LBrace) => i = self.skip_braces(i),
                // the rest of the number follows the one-digit script
                Some(Lexeme::Num(n)) if n.len() > 1 => return true,
                Some(_) => i += 1,
                None => return false,
            }
        }
        match kind(i) {
            Some(
                Lexeme::Num(_)
                | Lexeme::Letter(_)
                | Lexeme::LParen
                | Lexeme::LBracket
                | Lexeme::LBrace,
            ) => true,
            Some(Lexeme::Pipe) => self.open.last() != Some(&Open::Abs),
            Some(Lexeme::Cmd(c)) if c == "|" => self.open.last() != Some(&Open::Norm),
            Some(Lexeme::Cmd(c)) => {
                let c = c.as_str();
                SYMBOLS.contains(&c)
                    || FUNCTIONS.contains(&c)
                    || FRACTIONS.contains(&c)
                    || DECORATIONS.contains(&c)
                    || DERIVATIVE_ACCENTS.contains(&c)
                    || TEXT_COMMANDS.contains(&c)
                    || matches!(c, "sqrt" | "left" | "partial" | "nabla")
            }
            _ => false,
        }
    }

    /// Index just past the brace group opening at `i`.
    fn skip_braces(&self, mut i: usize) -> usize {
        let mut depth = 0usize;
        while let Some((_, lexeme, _)) = self.lex.get(i) {
            i += 1;
            match lexeme {
                Lexeme::LBrace => depth += 1,
                Lexeme::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        i
    }
}
