//! Global variable store.
//!
//! Holds every variable binding of an interpreter instance, including the
//! reserved constants `e` and `pi` and the `$0`, `$1`, … capture variables
//! written by the `=~` operator.

use std::collections::HashMap;

use crate::script::error::{Error, Result};
use crate::script::value::Value;

/// Names bound at construction that can never be reassigned.
pub const RESERVED_CONSTANTS: [&str; 2] = ["e", "pi"];

/// Keyword literals; they can never name a variable.
pub const KEYWORDS: [&str; 3] = ["null", "true", "false"];

/// Global name → value table.
#[derive(Debug, Clone)]
pub struct VarStore {
    vars: HashMap<String, Value>,
}

impl Default for VarStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VarStore {
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        vars.insert("e".to_owned(), Value::Number(std::f64::consts::E));
        vars.insert("pi".to_owned(), Value::Number(std::f64::consts::PI));
        Self { vars }
    }

    /// Returns `true` for `e`, `pi`, and the keyword literals.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_CONSTANTS.contains(&name) || KEYWORDS.contains(&name)
    }

    /// Set (or overwrite) a variable.  Reserved names are rejected.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        if Self::is_reserved(&name) {
            return Err(Error::ReservedConstant(name));
        }
        self.vars.insert(name, value);
        Ok(())
    }

    /// Bind capture group `index` as `$index`.
    pub fn set_capture(&mut self, index: usize, text: &str) {
        self.vars
            .insert(format!("${index}"), Value::Str(text.to_owned()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Iterate over user-visible bindings (everything but `e` and `pi`).
    pub fn iter_user(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars
            .iter()
            .filter(|(name, _)| !RESERVED_CONSTANTS.contains(&name.as_str()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
