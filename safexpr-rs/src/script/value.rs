//! Runtime value type.
//!
//! Every value the evaluator produces is a [`Value`].  Coercion is limited to
//! the rules below; every operator pairing either has a defined result or
//! fails with [`Error::TypeMismatch`].
//!
//! - `+` concatenates text forms when either side is a string.
//! - Arithmetic reads numbers, booleans (1/0), `null` (0), and numeric strings.
//! - `==` compares arrays and objects structurally.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::error::{Error, Result};

/// A dynamically-typed runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    #[default]
    Null,
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Integral values print without a fractional part.
fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => f.write_str(&format_number(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Value {
    /// Parse a bracketed `[...]` or `{...}` literal.
    pub fn parse_literal(text: &str) -> Result<Value> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| Error::InvalidLiteral {
                text: text.to_owned(),
                reason: e.to_string(),
            })
    }

    /// JSON form of this value.  Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => Json::from(*x as i64),
            Value::Number(x) => serde_json::Number::from_f64(*x)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Null => Json::Null,
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Text form used by concatenation, matching, and object keys.
    ///
    /// Same as `Display` except that `null` is the empty string.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Numeric form, if the value has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            Value::Str(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    s.parse().ok()
                }
            }
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Truthiness: `0`, `NaN`, `""`, `"0"`, `false`, `null`, `[]`, `{}` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(x) => *x != 0.0 && !x.is_nan(),
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn number_operand(&self, op: &str) -> Result<f64> {
        self.as_number()
            .ok_or_else(|| Error::type_mismatch(op, self.type_name()))
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    pub fn arith_add(&self, rhs: &Value) -> Result<Value> {
        if matches!(self, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
            let mut out = self.as_text();
            out.push_str(&rhs.as_text());
            return Ok(Value::Str(out));
        }
        Ok(Value::Number(
            self.number_operand("+")? + rhs.number_operand("+")?,
        ))
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value> {
        Ok(Value::Number(
            self.number_operand("-")? - rhs.number_operand("-")?,
        ))
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value> {
        Ok(Value::Number(
            self.number_operand("*")? * rhs.number_operand("*")?,
        ))
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value> {
        let a = self.number_operand("/")?;
        let b = rhs.number_operand("/")?;
        if b == 0.0 {
            return Err(Error::DivisionByZero);
        }
        Ok(Value::Number(a / b))
    }

    /// Remainder of the truncated operands.
    pub fn arith_rem(&self, rhs: &Value) -> Result<Value> {
        let a = self.number_operand("%")?.trunc() as i64;
        let b = rhs.number_operand("%")?.trunc() as i64;
        if b == 0 {
            return Err(Error::DivisionByZero);
        }
        Ok(Value::Number(a.wrapping_rem(b) as f64))
    }

    pub fn arith_pow(&self, rhs: &Value) -> Result<Value> {
        Ok(Value::Number(
            self.number_operand("^")?.powf(rhs.number_operand("^")?),
        ))
    }

    pub fn arith_neg(&self) -> Result<Value> {
        Ok(Value::Number(-self.number_operand("-")?))
    }

    pub fn logical_not(&self) -> Value {
        Value::Bool(!self.is_truthy())
    }

    // ── Comparison helpers ────────────────────────────────────────────────────

    /// `==` semantics: structural for arrays/objects, textual when either
    /// side is a string, numeric otherwise.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self.is_structured(), rhs.is_structured()) {
            (true, true) => self == rhs,
            (true, false) | (false, true) => false,
            (false, false) => {
                if matches!(self, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                    self.as_text() == rhs.as_text()
                } else {
                    self.as_number() == rhs.as_number()
                }
            }
        }
    }

    /// Relational ordering; `None` when either side is `NaN`.
    pub fn compare(&self, rhs: &Value, op: &str) -> Result<Option<Ordering>> {
        for side in [self, rhs] {
            if side.is_structured() {
                return Err(Error::type_mismatch(op, side.type_name()));
            }
        }
        if let (Value::Str(a), Value::Str(b)) = (self, rhs) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Ok(Some(self.as_text().cmp(&rhs.as_text()))),
        }
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    /// `container[key]`.  A missing element is `null`.
    pub fn select(&self, key: &Value) -> Result<Value> {
        match self {
            Value::Array(items) => {
                let idx = key.number_operand("[")?;
                if !idx.is_finite() || idx < 0.0 {
                    return Ok(Value::Null);
                }
                Ok(items.get(idx.trunc() as usize).cloned().unwrap_or_default())
            }
            Value::Object(map) => Ok(map.get(&key.as_text()).cloned().unwrap_or_default()),
            _ => Err(Error::InvalidSelector),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
