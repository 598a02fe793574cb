//! Postfix program elements.
//!
//! The converter emits a flat [`Program`] of [`Token`]s in operator-after-
//! operands order; the evaluator consumes it left to right.
//!
//! Operator table (lowest → highest precedence):
//!
//! | op | prec | assoc |
//! |----|------|-------|
//! | `&&` `\|\|` | 1 | left |
//! | `>` `<` `>=` `<=` `==` `!=` `=~` | 2 | left |
//! | `+` `-` | 3 | left |
//! | `*` `/` `_` `%` | 4 | left |
//! | `^` `!` | 5 | right |

use std::fmt;

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    And,
    Or,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Match,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Unary negation, spelled `_` in postfix form.
    Neg,
    Pow,
    /// Unary logical not.
    Not,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::And => "&&",
            Op::Or => "||",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Match => "=~",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Neg => "_",
            Op::Pow => "^",
            Op::Not => "!",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Op::And | Op::Or => 1,
            Op::Gt | Op::Lt | Op::Ge | Op::Le | Op::Eq | Op::Ne | Op::Match => 2,
            Op::Add | Op::Sub => 3,
            Op::Mul | Op::Div | Op::Neg | Op::Rem => 4,
            Op::Pow | Op::Not => 5,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, Op::Pow | Op::Not)
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Op::Neg | Op::Not)
    }

    /// Should `self`, already on the operator stack, be popped before pushing
    /// `incoming`?
    pub fn yields_to(self, incoming: Op) -> bool {
        if incoming.is_right_assoc() {
            incoming.precedence() < self.precedence()
        } else {
            incoming.precedence() <= self.precedence()
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One element of a postfix program.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Unescaped string literal.
    Str(String),
    /// Raw `[...]` / `{...}` literal, parsed when evaluated.
    Json(String),
    /// `null`/`true`/`false`, or a variable frozen into a function body.
    Value(Value),
    /// Bare identifier.
    Var(String),
    /// `$name` capture variable; the name includes the `$`.
    Capture(String),
    Regex { pattern: String, flags: String },
    Op(Op),
    Call { name: String, argc: usize },
    /// Index access; the selector's tokens precede this marker.
    Index,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(x) => write!(f, "{}", Value::Number(*x)),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Json(raw) => f.write_str(raw),
            Token::Value(Value::Str(s)) => write!(f, "{s:?}"),
            Token::Value(v) => write!(f, "{v}"),
            Token::Var(name) | Token::Capture(name) => f.write_str(name),
            Token::Regex { pattern, flags } => write!(f, "/{pattern}/{flags}"),
            Token::Op(op) => write!(f, "{op}"),
            Token::Call { name, argc } => write!(f, "{name}({argc})"),
            Token::Index => f.write_str("[]"),
        }
    }
}

/// A converted expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    tokens: Vec<Token>,
}

impl Program {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Net operand-stack effect of running the program; a well-formed
    /// program has depth 1.
    pub fn stack_depth(&self) -> isize {
        self.tokens.iter().fold(0, |depth, token| {
            depth + match token {
                Token::Op(op) if op.is_unary() => 0,
                Token::Op(_) | Token::Index => -1,
                Token::Call { argc, .. } => 1 - *argc as isize,
                _ => 1,
            }
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
