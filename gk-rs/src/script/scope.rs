//! Name bindings.
//!
//! A [`Scope`] is one frame of the evaluator's scope stack.  Each scope owns
//! its table outright; nothing is shared between evaluations.

use std::collections::HashMap;
use std::fmt;

use super::eval::{EvalContext, EvalError};
use super::expr::Expr;

/// Host-implemented callable.  Receives its argument expressions unevaluated
/// and decides itself which of them to evaluate.
pub type BuiltinFn = fn(&mut EvalContext<'_>, &[Expr]) -> Result<Expr, EvalError>;

// ── Binding ───────────────────────────────────────────────────────────────────

/// What a name is bound to.
#[derive(Clone)]
pub enum Binding {
    /// A host callable such as `say` or `add`.
    Builtin(BuiltinFn),
    /// A value computed once when the binding was made (`let`).
    Value(Expr),
    /// An expression evaluated afresh, in the caller's scope, every time the
    /// name is used.
    Lazy(Expr),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Builtin(_) => f.write_str("Builtin(..)"),
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Lazy(e) => f.debug_tuple("Lazy").field(e).finish(),
        }
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, failing with [`EvalError::DuplicateBinding`] if this scope
    /// already binds it.  Outer scopes are not consulted.
    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) -> Result<(), EvalError> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(EvalError::DuplicateBinding(name));
        }
        self.bindings.insert(name, binding);
        Ok(())
    }

    /// Builder form used when assembling the root scope.
    pub fn with_builtin(mut self, name: &str, f: BuiltinFn) -> Self {
        self.bindings.insert(name.to_owned(), Binding::Builtin(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
