//! The command scripting language.
//!
//! Stored command bodies and `eval` input are scripts: a sequence of
//! expressions built from string and integer literals, names and calls.
//!
//! - [`parse`] turns source text into [`Expr`] trees.
//! - [`eval`] walks them under a per-invocation budget.
//! - [`scope`] holds name bindings; [`builtins`] fills the root scope.
//!
//! # Quick start
//!
//! ```rust
//! use gk::env::Recording;
//! use gk::script::{run_script, Invocation, Limits};
//!
//! let env = Recording::new("alice");
//! run_script("say(\"hi \", author())", &env, Invocation::default(), Limits::default()).unwrap();
//! assert_eq!(env.messages(), vec!["hi @alice"]);
//! ```

pub mod builtins;
pub mod eval;
pub mod expr;
pub mod parse;
pub mod scope;

use thiserror::Error;

use crate::env::Environment;

// Re-exports for convenience.
pub use eval::{EvalContext, EvalError, Invocation, Limits};
pub use expr::{Expr, ExprKind, Funcall};
pub use parse::{parse_all, parse_expr, ParseError};
pub use scope::{Binding, Scope};

/// Either stage of running a script failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Eval(#[from] EvalError),
}

/// Parse `source` and evaluate it in a fresh context.
pub fn run_script(
    source: &str,
    env: &dyn Environment,
    invocation: Invocation,
    limits: Limits,
) -> Result<Expr, ScriptError> {
    let exprs = parse_all(source)?;
    let mut ctx = EvalContext::new(env, invocation, limits);
    Ok(ctx.evaluate_sequence(&exprs)?)
}
