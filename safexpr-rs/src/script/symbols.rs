//! Symbol table shared by the converter and the evaluator.
//!
//! Owns the global [`VarStore`], user-defined functions and registered host
//! functions.  Builtins are not stored; they are resolved by name and can
//! never be shadowed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::var::VarStore;
use super::{
    builtins::{is_builtin, Builtin},
    error::{Error, Result},
    eval::{EvalContext, Function, HostFunction, UserFunction},
    expr::convert,
    token::Token,
    value::Value,
};

/// `[a-z]\w*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    vars: VarStore,
    functions: HashMap<String, Arc<UserFunction>>,
    hosts: HashMap<String, HostFunction>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    /// Bind a global variable.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        if VarStore::is_reserved(name) {
            return Err(Error::ReservedConstant(name.to_owned()));
        }
        if !is_identifier(name) {
            return Err(Error::InvalidName(name.to_owned()));
        }
        if self.is_function(name) {
            return Err(Error::AssignToFunction(name.to_owned()));
        }
        self.vars.set(name, value)
    }

    /// Define (or redefine) `name(params) = body`.
    ///
    /// Every name in the body that is not a parameter is replaced by its
    /// current value, so later assignments do not affect the function.
    pub fn define_function(&mut self, name: &str, params: &[String], body: &str) -> Result<()> {
        if is_builtin(name) {
            return Err(Error::BuiltinRedefinition(name.to_owned()));
        }
        if !is_identifier(name) || VarStore::is_reserved(name) {
            return Err(Error::InvalidName(name.to_owned()));
        }
        let mut seen = HashSet::new();
        for param in params {
            if !is_identifier(param) || VarStore::is_reserved(param) {
                return Err(Error::InvalidName(param.clone()));
            }
            if !seen.insert(param.as_str()) {
                return Err(Error::DuplicateParameter(param.clone()));
            }
        }

        let mut program = convert(body, self)?;
        for token in program.tokens_mut() {
            let Token::Var(var) = token else { continue };
            if params.contains(var) {
                continue;
            }
            let value = self
                .vars
                .get(var)
                .cloned()
                .ok_or_else(|| Error::UndefinedInDefinition(var.clone()))?;
            *token = Token::Value(value);
        }

        debug!(function = name, params = ?params, body = %program, "defined function");
        self.functions.insert(
            name.to_owned(),
            Arc::new(UserFunction {
                params: params.to_vec(),
                body: program,
            }),
        );
        Ok(())
    }

    /// Make a host callable available as `name(...)` with a fixed arity.
    pub fn register_host_function(&mut self, name: &str, function: HostFunction) -> Result<()> {
        if is_builtin(name) {
            return Err(Error::BuiltinRedefinition(name.to_owned()));
        }
        if !is_identifier(name) || VarStore::is_reserved(name) {
            return Err(Error::InvalidName(name.to_owned()));
        }
        debug!(function = name, arity = function.arity(), "registered host function");
        self.hosts.insert(name.to_owned(), function);
        Ok(())
    }

    pub fn is_function(&self, name: &str) -> bool {
        is_builtin(name) || self.functions.contains_key(name) || self.hosts.contains_key(name)
    }

    pub fn user_function(&self, name: &str) -> Option<&UserFunction> {
        self.functions.get(name).map(Arc::as_ref)
    }

    /// User-visible variables sorted by name (`e` and `pi` excluded).
    pub fn variables(&self) -> Vec<(String, Value)> {
        let mut vars: Vec<_> = self
            .vars
            .iter_user()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// User functions sorted by name, with their parameter lists.
    pub fn functions(&self) -> Vec<(String, Vec<String>)> {
        let mut fns: Vec<_> = self
            .functions
            .iter()
            .map(|(name, f)| (name.clone(), f.params.clone()))
            .collect();
        fns.sort_by(|a, b| a.0.cmp(&b.0));
        fns
    }
}

impl EvalContext for SymbolTable {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    fn set_capture(&mut self, index: usize, text: &str) {
        self.vars.set_capture(index, text);
    }

    fn function(&self, name: &str) -> Option<Function> {
        if is_builtin(name) {
            return Builtin::from_name(name).map(Function::Builtin);
        }
        if let Some(f) = self.functions.get(name) {
            return Some(Function::User(Arc::clone(f)));
        }
        self.hosts.get(name).cloned().map(Function::Host)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
