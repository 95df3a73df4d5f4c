//!
//! # Technology Variables
//!
//! Layered name-value lookup: local scopes, innermost first, then the global table,
//! then (optionally) the process environment.
//!

// Std-Lib
use std::collections::BTreeMap;

/// Maximum substitution passes per line, bounding self-referential variables
const MAX_PASSES: usize = 100;

/// # Technology Variable Table
#[derive(Debug, Clone, Default)]
pub struct TechVars {
    globals: BTreeMap<String, String>,
    scopes: Vec<BTreeMap<String, String>>,
    /// Fall back to the process environment
    pub use_env: bool,
}
impl TechVars {
    pub fn new(use_env: bool) -> Self {
        Self {
            use_env,
            ..Default::default()
        }
    }
    /// Set global `name`
    pub fn set(&mut self, name: impl Into<String>, val: impl Into<String>) {
        self.globals.insert(name.into(), val.into());
    }
    /// Remove global `name`, returning whether it was set
    pub fn unset(&mut self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }
    /// Open a new local scope
    pub fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }
    /// Close the innermost local scope
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }
    /// Set `name` in the innermost local scope, or globally if none is open
    pub fn set_local(&mut self, name: impl Into<String>, val: impl Into<String>) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.into(), val.into());
            }
            None => self.set(name, val),
        }
    }
    /// Look up `name` through the local scopes, globals, and environment
    pub fn get(&self, name: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return Some(v.clone());
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Some(v.clone());
        }
        if self.use_env {
            return std::env::var(name).ok();
        }
        None
    }
    /// Replace every `$(name)` in `text`.
    /// Innermost references expand first, so names may themselves be built from references,
    /// and values are re-scanned until no references remain.
    pub fn substitute(&self, text: &str) -> Result<String, String> {
        let mut text = text.to_string();
        for _ in 0..MAX_PASSES {
            let start = match text.rfind("$(") {
                Some(start) => start,
                None => return Ok(text),
            };
            let len = match text[start + 2..].find(')') {
                Some(len) => len,
                None => return Err(format!("Unterminated `$(` in `{}`", text)),
            };
            let name = text[start + 2..start + 2 + len].trim();
            let val = match self.get(name) {
                Some(val) => val,
                None => return Err(format!("Unresolved variable `{}`", name)),
            };
            text.replace_range(start..start + 3 + len, &val);
        }
        Err(format!("Too many nested substitutions in `{}`", text))
    }
}
