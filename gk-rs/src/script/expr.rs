//! Expression tree for the command language.
//!
//! A script is a sequence of [`Expr`] trees.  The language has no separate
//! runtime value type: evaluating an `Expr` yields another `Expr`, normally
//! `Void`, `Int` or `Str`.  Trees are never mutated once parsed.
//!
//! The [`Display`](fmt::Display) impl is the serializer used to store and show
//! scripts; it is the left inverse of [`parse_all`](super::parse::parse_all).

use std::fmt;

// ── Expr ──────────────────────────────────────────────────────────────────────

/// A parsed expression, or the result of evaluating one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Expr {
    /// The empty result.
    #[default]
    Void,
    Int(i64),
    Str(String),
    /// Reference to a bound name, resolved at evaluation time.
    Var(String),
    Funcall(Funcall),
}

/// A call `name(arg, …)`.  Arguments stay unevaluated until the callee asks
/// for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funcall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// The variant of an [`Expr`], used in type-mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Void,
    Int,
    Str,
    Var,
    Funcall,
}

impl ExprKind {
    pub fn name(self) -> &'static str {
        match self {
            ExprKind::Void => "Void",
            ExprKind::Int => "Int",
            ExprKind::Str => "Str",
            ExprKind::Var => "Var",
            ExprKind::Funcall => "Funcall",
        }
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Expr {
    pub fn str(s: impl Into<String>) -> Self {
        Expr::Str(s.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Funcall(Funcall {
            name: name.into(),
            args,
        })
    }

    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::Void => ExprKind::Void,
            Expr::Int(_) => ExprKind::Int,
            Expr::Str(_) => ExprKind::Str,
            Expr::Var(_) => ExprKind::Var,
            Expr::Funcall(_) => ExprKind::Funcall,
        }
    }

    /// Truthiness as used by `or`: nonzero ints, nonempty strings, and any
    /// unevaluated call or reference are truthy; `Void` never is.
    pub fn is_truthy(&self) -> bool {
        match self {
            Expr::Void => false,
            Expr::Int(n) => *n != 0,
            Expr::Str(s) => !s.is_empty(),
            Expr::Var(_) | Expr::Funcall(_) => true,
        }
    }

    /// Number of nodes in this tree, counting every literal, reference and
    /// call once.  This is the evaluation cost of a tree whose calls evaluate
    /// each argument exactly once.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Funcall(call) => 1 + call.args.iter().map(Expr::node_count).sum::<usize>(),
            _ => 1,
        }
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Int(n)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Str(s.to_owned())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Str(s)
    }
}

// ── Serialization ─────────────────────────────────────────────────────────────

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Void => Ok(()),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Str(s) => write_quoted(f, s),
            Expr::Var(name) => f.write_str(name),
            Expr::Funcall(call) => write!(f, "{call}"),
        }
    }
}

impl fmt::Display for Funcall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Write `s` as a string literal, escaping exactly the characters the parser
/// knows how to unescape.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

// ── Tree dump ─────────────────────────────────────────────────────────────────

impl Expr {
    /// Indented one-node-per-line rendering of the tree, for debugging.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, level: usize) {
        out.push_str(&"  ".repeat(level));
        match self {
            Expr::Void => out.push_str("Void\n"),
            Expr::Int(n) => out.push_str(&format!("Int: {n}\n")),
            Expr::Str(_) => out.push_str(&format!("Str: {self}\n")),
            Expr::Var(name) => out.push_str(&format!("Var: {name}\n")),
            Expr::Funcall(call) => {
                out.push_str(&format!("Funcall: {}\n", call.name));
                for arg in &call.args {
                    arg.dump_into(out, level + 1);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
