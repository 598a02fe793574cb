//! Failure signals for conversion and evaluation.
//!
//! Every failure aborts the current expression and is returned as an
//! [`Error`].  Variants fall into three [`ErrorCategory`]s: syntax errors
//! raised by the converter, semantic errors raised while resolving names or
//! applying operators, and internal-consistency errors that indicate the
//! converter and evaluator disagree about a program's shape.

use thiserror::Error;

use crate::pattern::PatternError;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Semantic,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // ── Syntax ───────────────────────────────────────────────────────────────
    #[error("empty expression")]
    EmptyExpression,

    #[error("unexpected {0}")]
    Unexpected(String),

    #[error("illegal character '{0}'")]
    IllegalChar(char),

    #[error("unbalanced parenthesis")]
    UnbalancedParen,

    #[error("operator '{0}' lacks operand")]
    MissingOperand(&'static str),

    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("malformed index: {0}")]
    MalformedIndex(String),

    // ── Semantic ─────────────────────────────────────────────────────────────
    /// Raised by the converter for calls it can check and by the evaluator
    /// when a function changed arity after the program was built.
    #[error("wrong number of arguments to '{name}' ({given} given, {expected} expected)")]
    ArgumentCount {
        name: String,
        given: usize,
        expected: usize,
    },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined variable '{0}' in function definition")]
    UndefinedInDefinition(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("cannot assign to constant '{0}'")]
    ReservedConstant(String),

    #[error("cannot assign to function '{0}'")]
    AssignToFunction(String),

    #[error("cannot redefine built-in function '{0}'")]
    BuiltinRedefinition(String),

    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("invalid literal '{text}': {reason}")]
    InvalidLiteral { text: String, reason: String },

    #[error("invalid object for selector")]
    InvalidSelector,

    #[error("unsupported operand for '{op}': {found}")]
    TypeMismatch { op: String, found: &'static str },

    #[error("host function '{name}' failed: {message}")]
    HostFunction { name: String, message: String },

    #[error("recursion too deep (limit {0})")]
    RecursionLimit(usize),

    #[error("step limit exceeded (limit {0})")]
    StepLimit(usize),

    // ── Internal consistency ─────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyExpression
            | Error::Unexpected(_)
            | Error::IllegalChar(_)
            | Error::UnbalancedParen
            | Error::MissingOperand(_)
            | Error::Unterminated(_)
            | Error::MalformedIndex(_) => ErrorCategory::Syntax,
            Error::Internal(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Semantic,
        }
    }

    pub(crate) fn type_mismatch(op: impl Into<String>, found: &'static str) -> Self {
        Error::TypeMismatch {
            op: op.into(),
            found,
        }
    }
}

impl From<PatternError> for Error {
    fn from(e: PatternError) -> Self {
        Error::InvalidRegex(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
