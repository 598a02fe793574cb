//! Expression language.
//!
//! Input text goes through three stages:
//!
//! 1. [`expr::convert`] lexes the text and reorders it into a postfix
//!    [`Program`] with the shunting-yard algorithm.
//! 2. [`eval::Evaluator`] runs the program on an operand stack.
//! 3. Both consult a [`SymbolTable`] for variables and functions.
//!
//! [`Interpreter`] ties the stages together and handles the assignment and
//! function-definition forms.
//!
//! # Quick start
//!
//! ```rust
//! use safexpr::script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.evaluate("f(x, y) = x^2 + y^2 - 2*x*y + 1").unwrap();
//! assert_eq!(interp.evaluate("f(3, 4)").unwrap(), Value::Number(2.0));
//! ```

pub mod builtins;
pub mod error;
pub mod eval;
pub mod expr;
pub mod interp;
pub mod symbols;
pub mod token;
pub mod value;

// Re-exports for convenience.
pub use error::{Error, ErrorCategory, Result};
pub use eval::{EvalContext, HostFunction, Limits};
pub use interp::Interpreter;
pub use symbols::SymbolTable;
pub use token::{Program, Token};
pub use value::Value;
