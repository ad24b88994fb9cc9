//! Tree-walking evaluator.
//!
//! An [`EvalContext`] is created for one top-level invocation and dropped at
//! its end.  It owns the scope stack (root scope holding the builtins, plus
//! one scope per active `let`), the remaining evaluation budget, and the
//! random source `choice` draws from.
//!
//! Every node evaluated costs one unit of budget, checked before the node is
//! looked at.  Nesting depth is bounded separately so that a script cannot
//! exhaust the native stack while still under budget.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::env::Environment;
use super::builtins;
use super::expr::{Expr, ExprKind};
use super::scope::{Binding, Scope};

/// Node evaluations allowed per invocation unless configured otherwise.
pub const DEFAULT_BUDGET: u32 = 100;

/// Maximum nesting depth of evaluation unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// ── Limits ────────────────────────────────────────────────────────────────────

/// Per-deployment resource bounds applied to every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub budget: u32,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ── Invocation ────────────────────────────────────────────────────────────────

/// What triggered the evaluation, as seen by `input()` and `count()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Name of the command being run.
    pub command: String,
    /// Text following the command name.
    pub input: String,
    /// How many times the command has run, this run included.  Zero for
    /// ad-hoc evaluation.
    pub count: i64,
}

impl Invocation {
    pub fn new(command: impl Into<String>, input: impl Into<String>, count: i64) -> Self {
        Self {
            command: command.into(),
            input: input.into(),
            count,
        }
    }
}

// ── EvalError ─────────────────────────────────────────────────────────────────

/// How many arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, n) = match self {
            Arity::Exactly(n) => ("", *n),
            Arity::AtLeast(n) => ("at least ", *n),
        };
        let noun = if n == 1 { "argument" } else { "arguments" };
        write!(f, "{prefix}{n} {noun}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("Unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{function}` expects {expected} but got {got}")]
    ArityMismatch {
        function: String,
        expected: Arity,
        got: usize,
    },
    #[error("`{function}`: argument {position} `{expr}` evaluated to {actual}, expected {expected}")]
    TypeMismatch {
        function: String,
        position: usize,
        expr: String,
        actual: ExprKind,
        expected: &'static str,
    },
    #[error("`{function}`: {message}")]
    InvalidArgument { function: String, message: String },
    #[error("Integer overflow in `{0}`")]
    IntegerOverflow(String),
    #[error("Redefinition of the let-binding `{0}`")]
    DuplicateBinding(String),
    #[error(
        "`{0}` is not a binding. Bindings must be calls, for example: \
         let(x(34), y(35), say(add(x, y)))"
    )]
    InvalidBinding(String),
    #[error(
        "`{binding}` calls the builtin `{name}` instead of binding a name. \
         Put the body last and wrap several body expressions in do(...)"
    )]
    BodyNotSequence { binding: String, name: String },
    #[error("`{0}` is a builtin and cannot be used as a let-binding name")]
    ReservedBindingName(String),
    #[error("Evaluation budget exhausted")]
    BudgetExhausted,
    #[error("Expressions nested deeper than {0} levels")]
    DepthExceeded(usize),
}

// ── EvalContext ───────────────────────────────────────────────────────────────

pub struct EvalContext<'a> {
    /// Innermost scope last; index 0 is the root scope.
    scopes: Vec<Scope>,
    budget: u32,
    depth: usize,
    max_depth: usize,
    env: &'a dyn Environment,
    invocation: Invocation,
    rng: StdRng,
}

impl<'a> EvalContext<'a> {
    /// A fresh context whose root scope holds the builtin library.
    pub fn new(env: &'a dyn Environment, invocation: Invocation, limits: Limits) -> Self {
        EvalContext {
            scopes: vec![builtins::root_scope()],
            budget: limits.budget,
            depth: 0,
            max_depth: limits.max_depth,
            env,
            invocation,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn env(&self) -> &'a dyn Environment {
        self.env
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn remaining_budget(&self) -> u32 {
        self.budget
    }

    /// Number of scopes on the stack, root included.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// The root scope, for hosts that add their own bindings before running.
    pub fn root_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Pop the innermost scope.  The root scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Run `f` with `scope` pushed, popping it again however `f` returns.
    pub fn with_scope<T>(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        self.push_scope(scope);
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Resolve `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// `true` if `name` is a builtin of the root scope.
    pub fn is_builtin(&self, name: &str) -> bool {
        matches!(self.scopes[0].get(name), Some(Binding::Builtin(_)))
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate one expression.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Expr, EvalError> {
        if self.budget == 0 {
            return Err(EvalError::BudgetExhausted);
        }
        if self.depth >= self.max_depth {
            return Err(EvalError::DepthExceeded(self.max_depth));
        }
        self.budget -= 1;
        self.depth += 1;
        let result = self.evaluate_node(expr);
        self.depth -= 1;
        result
    }

    /// Evaluate `exprs` left to right, stopping at the first failure.  The
    /// result is that of the last expression, or `Void` for an empty list.
    pub fn evaluate_sequence(&mut self, exprs: &[Expr]) -> Result<Expr, EvalError> {
        let mut last = Expr::Void;
        for expr in exprs {
            last = self.evaluate(expr)?;
        }
        Ok(last)
    }

    fn evaluate_node(&mut self, expr: &Expr) -> Result<Expr, EvalError> {
        match expr {
            Expr::Void | Expr::Int(_) | Expr::Str(_) => Ok(expr.clone()),

            Expr::Var(name) => match self.lookup(name).cloned() {
                Some(Binding::Value(value)) => Ok(value),
                Some(Binding::Lazy(bound)) => self.evaluate(&bound),
                // Legacy scripts write zero-argument calls without parens.
                Some(Binding::Builtin(f)) => f(self, &[]),
                None => Err(EvalError::UnknownVariable(name.clone())),
            },

            Expr::Funcall(call) => match self.lookup(&call.name).cloned() {
                Some(Binding::Builtin(f)) => f(self, &call.args),
                Some(Binding::Value(_) | Binding::Lazy(_)) if !call.args.is_empty() => {
                    Err(EvalError::ArityMismatch {
                        function: call.name.clone(),
                        expected: Arity::Exactly(0),
                        got: call.args.len(),
                    })
                }
                Some(Binding::Value(value)) => Ok(value),
                Some(Binding::Lazy(bound)) => self.evaluate(&bound),
                None => Err(EvalError::UnknownFunction(call.name.clone())),
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Recording;
    use crate::script::parse::parse_all;

    fn run_with(src: &str, limits: Limits) -> Result<Expr, EvalError> {
        let env = Recording::new("tester");
        let exprs = parse_all(src).expect("parse failed");
        let mut ctx = EvalContext::new(&env, Invocation::default(), limits);
        ctx.evaluate_sequence(&exprs)
    }

    fn run(src: &str) -> Result<Expr, EvalError> {
        run_with(src, Limits::default())
    }

    fn budget(n: u32) -> Limits {
        Limits {
            budget: n,
            ..Limits::default()
        }
    }

    #[test]
    fn literals_evaluate_to_themselves() {
        assert_eq!(run("42"), Ok(Expr::Int(42)));
        assert_eq!(run("\"hi\""), Ok(Expr::str("hi")));
        assert_eq!(run(""), Ok(Expr::Void));
    }

    #[test]
    fn sequence_result_is_last() {
        assert_eq!(run("1 2 \"three\""), Ok(Expr::str("three")));
    }

    #[test]
    fn unknown_names() {
        assert_eq!(run("nope"), Err(EvalError::UnknownVariable("nope".into())));
        assert_eq!(
            run("nope(1)"),
            Err(EvalError::UnknownFunction("nope".into()))
        );
    }

    #[test]
    fn sequence_stops_at_first_failure() {
        let env = Recording::new("tester");
        let exprs = parse_all("say(\"first\") boom() say(\"never\")").unwrap();
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        assert!(ctx.evaluate_sequence(&exprs).is_err());
        assert_eq!(env.messages(), vec!["first"]);
    }

    #[test]
    fn budget_exact_fit_succeeds() {
        // add + 1 + 2
        assert_eq!(run_with("add(1, 2)", budget(3)), Ok(Expr::Int(3)));
        assert_eq!(
            run_with("add(1, 2)", budget(2)),
            Err(EvalError::BudgetExhausted)
        );
    }

    #[test]
    fn budget_checked_before_literals() {
        assert_eq!(run_with("1", budget(0)), Err(EvalError::BudgetExhausted));
    }

    #[test]
    fn budget_spent_is_tracked() {
        let env = Recording::new("tester");
        let exprs = parse_all("concat(\"a\", add(1, 2))").unwrap();
        let mut ctx = EvalContext::new(&env, Invocation::default(), budget(10));
        ctx.evaluate_sequence(&exprs).unwrap();
        assert_eq!(ctx.remaining_budget(), 5);
    }

    #[test]
    fn depth_limit() {
        let deep = "add(".repeat(10) + "1" + &")".repeat(10);
        let limits = Limits {
            budget: 1000,
            max_depth: 5,
        };
        assert_eq!(run_with(&deep, limits), Err(EvalError::DepthExceeded(5)));
        let limits = Limits {
            budget: 1000,
            max_depth: 11,
        };
        assert_eq!(run_with(&deep, limits), Ok(Expr::Int(1)));
    }

    #[test]
    fn value_binding_resolves_as_variable_and_call() {
        let env = Recording::new("tester");
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        let mut scope = Scope::new();
        scope.bind("x", Binding::Value(Expr::Int(7))).unwrap();
        ctx.push_scope(scope);
        assert_eq!(ctx.evaluate(&Expr::var("x")), Ok(Expr::Int(7)));
        assert_eq!(ctx.evaluate(&Expr::call("x", vec![])), Ok(Expr::Int(7)));
        assert!(matches!(
            ctx.evaluate(&Expr::call("x", vec![Expr::Int(1)])),
            Err(EvalError::ArityMismatch { got: 1, .. })
        ));
    }

    #[test]
    fn lazy_binding_evaluates_on_each_use() {
        let env = Recording::new("tester");
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        ctx.root_mut()
            .bind("greet", Binding::Lazy(Expr::call("say", vec![Expr::str("hi")])))
            .unwrap();
        ctx.evaluate(&Expr::var("greet")).unwrap();
        ctx.evaluate(&Expr::var("greet")).unwrap();
        assert_eq!(env.messages(), vec!["hi", "hi"]);
    }

    #[test]
    fn bare_builtin_name_is_zero_arg_call() {
        assert_eq!(run("author"), Ok(Expr::str("@tester")));
    }

    #[test]
    fn with_scope_pops_on_error() {
        let env = Recording::new("tester");
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        let result = ctx.with_scope(Scope::new(), |ctx| ctx.evaluate(&Expr::var("missing")));
        assert!(result.is_err());
        assert_eq!(ctx.scope_depth(), 1);
    }

    #[test]
    fn root_scope_is_never_popped() {
        let env = Recording::new("tester");
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        assert!(ctx.pop_scope().is_none());
        assert!(ctx.is_builtin("say"));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let env = Recording::new("tester");
        let mut ctx = EvalContext::new(&env, Invocation::default(), Limits::default());
        let mut outer = Scope::new();
        outer.bind("x", Binding::Value(Expr::Int(1))).unwrap();
        let mut inner = Scope::new();
        inner.bind("x", Binding::Value(Expr::Int(2))).unwrap();
        ctx.push_scope(outer);
        let seen = ctx.with_scope(inner, |ctx| ctx.evaluate(&Expr::var("x")));
        assert_eq!(seen, Ok(Expr::Int(2)));
        assert_eq!(ctx.evaluate(&Expr::var("x")), Ok(Expr::Int(1)));
    }

    #[test]
    fn arity_display() {
        assert_eq!(Arity::Exactly(1).to_string(), "1 argument");
        assert_eq!(Arity::Exactly(3).to_string(), "3 arguments");
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1 argument");
    }
}
