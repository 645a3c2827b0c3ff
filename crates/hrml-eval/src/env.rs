//! Scoped variable environment.

use hrml_types::Value;
use std::collections::BTreeMap;

/// A single scope level.
#[derive(Debug, Clone, Default)]
struct Scope {
    bindings: BTreeMap<String, Value>,
}

/// Scoped variable environment with push/pop semantics.
///
/// Variables are looked up from innermost scope outward. `define` always
/// binds in the innermost scope. The outermost scope is never popped.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// Create an environment with one empty scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Push a new innermost scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Push a scope holding every entry of `fields`.
    ///
    /// Used for the request context and site constants: a map value's keys
    /// become top-level variable names.
    pub fn push_map(&mut self, fields: BTreeMap<String, Value>) {
        self.scopes.push(Scope { bindings: fields });
    }

    /// Pop the innermost scope.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of scopes currently on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pop scopes until only `depth` remain.
    ///
    /// Lets a caller release every binding made since it recorded
    /// [`Environment::depth`], whatever path it exits by.
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Bind a variable in the innermost scope.
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Look up a variable, searching from innermost to outermost scope.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Resolve a dotted path such as `user.address.city` or `items.0`.
    ///
    /// Returns `None` as soon as any segment is missing.
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.get(first)?, |value, segment| value.member(segment))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
