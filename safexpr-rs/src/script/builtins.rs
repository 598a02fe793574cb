//! Built-in math functions.
//!
//! The set is fixed and every member takes exactly one argument.  The
//! `arc`-prefixed spellings alias the inverse functions (`arcsin` → `asin`)
//! and `ln` is a synonym for `log` (natural logarithm).

use super::error::{Error, Result};
use super::value::Value;

/// Every name accepted as a builtin, aliases included.
pub const NAMES: [&str; 22] = [
    "sin", "sinh", "arcsin", "asin", "arcsinh", "asinh", "cos", "cosh", "arccos", "acos",
    "arccosh", "acosh", "tan", "tanh", "arctan", "atan", "arctanh", "atanh", "sqrt", "abs", "ln",
    "log",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Sinh,
    Asin,
    Asinh,
    Cos,
    Cosh,
    Acos,
    Acosh,
    Tan,
    Tanh,
    Atan,
    Atanh,
    Sqrt,
    Abs,
    Log,
}

impl Builtin {
    /// Resolve a name, following the `arc*` and `ln` aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let canonical = match name.strip_prefix("arc") {
            Some(rest) if !rest.is_empty() => format!("a{rest}"),
            _ => name.to_owned(),
        };
        Some(match canonical.as_str() {
            "sin" => Builtin::Sin,
            "sinh" => Builtin::Sinh,
            "asin" => Builtin::Asin,
            "asinh" => Builtin::Asinh,
            "cos" => Builtin::Cos,
            "cosh" => Builtin::Cosh,
            "acos" => Builtin::Acos,
            "acosh" => Builtin::Acosh,
            "tan" => Builtin::Tan,
            "tanh" => Builtin::Tanh,
            "atan" => Builtin::Atan,
            "atanh" => Builtin::Atanh,
            "sqrt" => Builtin::Sqrt,
            "abs" => Builtin::Abs,
            "ln" | "log" => Builtin::Log,
            _ => return None,
        })
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Builtin::Sin => x.sin(),
            Builtin::Sinh => x.sinh(),
            Builtin::Asin => x.asin(),
            Builtin::Asinh => x.asinh(),
            Builtin::Cos => x.cos(),
            Builtin::Cosh => x.cosh(),
            Builtin::Acos => x.acos(),
            Builtin::Acosh => x.acosh(),
            Builtin::Tan => x.tan(),
            Builtin::Tanh => x.tanh(),
            Builtin::Atan => x.atan(),
            Builtin::Atanh => x.atanh(),
            Builtin::Sqrt => x.sqrt(),
            Builtin::Abs => x.abs(),
            Builtin::Log => x.ln(),
        }
    }

    /// Apply to an argument with a numeric form.
    pub fn call(self, arg: &Value) -> Result<Value> {
        arg.as_number()
            .map(|x| Value::Number(self.apply(x)))
            .ok_or_else(|| Error::type_mismatch(self.name(), arg.type_name()))
    }

    /// Canonical spelling.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Sin => "sin",
            Builtin::Sinh => "sinh",
            Builtin::Asin => "asin",
            Builtin::Asinh => "asinh",
            Builtin::Cos => "cos",
            Builtin::Cosh => "cosh",
            Builtin::Acos => "acos",
            Builtin::Acosh => "acosh",
            Builtin::Tan => "tan",
            Builtin::Tanh => "tanh",
            Builtin::Atan => "atan",
            Builtin::Atanh => "atanh",
            Builtin::Sqrt => "sqrt",
            Builtin::Abs => "abs",
            Builtin::Log => "log",
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    NAMES.contains(&name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
