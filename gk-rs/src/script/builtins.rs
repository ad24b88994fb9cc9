//! Builtin functions of the root scope.
//!
//! Every builtin receives its arguments unevaluated and evaluates only what
//! it needs, which is what lets `or`, `choice`, `let` and the platform
//! conditionals skip the branches they do not take.  Argument positions in
//! diagnostics are 1-based.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use rand::Rng;
use regex::Regex;

use crate::env::Platform;
use super::eval::{Arity, EvalContext, EvalError};
use super::expr::{Expr, Funcall};
use super::scope::{Binding, BuiltinFn, Scope};

/// Name → implementation of every builtin.
const BUILTINS: &[(&str, BuiltinFn)] = &[
    // ── Control ──────────────────────────────────────────────────────────────
    ("do", builtin_do),
    ("let", builtin_let),
    ("or", builtin_or),
    ("choice", builtin_choice),
    // ── Text ─────────────────────────────────────────────────────────────────
    ("concat", builtin_concat),
    ("say", builtin_say),
    ("uppercase", builtin_uppercase),
    ("urlencode", builtin_urlencode),
    ("fancy", builtin_fancy),
    ("replace", builtin_replace),
    // ── Arithmetic ───────────────────────────────────────────────────────────
    ("add", builtin_add),
    ("sub", builtin_sub),
    // ── Environment ──────────────────────────────────────────────────────────
    ("author", builtin_author),
    ("admin", builtin_admin),
    ("privileged", builtin_privileged),
    ("count", builtin_count),
    ("input", builtin_input),
    ("discord", builtin_discord),
    ("twitch_or_discord", builtin_twitch_or_discord),
    // ── Time ─────────────────────────────────────────────────────────────────
    ("year", builtin_year),
    ("days_left_until", builtin_days_left_until),
];

/// A scope holding every builtin.
pub fn root_scope() -> Scope {
    BUILTINS
        .iter()
        .fold(Scope::new(), |scope, &(name, f)| scope.with_builtin(name, f))
}

/// Names of all builtins, in catalog order.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|&(name, _)| name)
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn expect_arity(function: &str, args: &[Expr], arity: Arity) -> Result<(), EvalError> {
    if arity.accepts(args.len()) {
        Ok(())
    } else {
        Err(EvalError::ArityMismatch {
            function: function.to_owned(),
            expected: arity,
            got: args.len(),
        })
    }
}

fn type_mismatch(function: &str, index: usize, arg: &Expr, value: &Expr, expected: &'static str) -> EvalError {
    EvalError::TypeMismatch {
        function: function.to_owned(),
        position: index + 1,
        expr: arg.to_string(),
        actual: value.kind(),
        expected,
    }
}

fn eval_int(ctx: &mut EvalContext<'_>, function: &str, args: &[Expr], index: usize) -> Result<i64, EvalError> {
    match ctx.evaluate(&args[index])? {
        Expr::Int(n) => Ok(n),
        other => Err(type_mismatch(function, index, &args[index], &other, "Int")),
    }
}

fn eval_str(ctx: &mut EvalContext<'_>, function: &str, args: &[Expr], index: usize) -> Result<String, EvalError> {
    match ctx.evaluate(&args[index])? {
        Expr::Str(s) => Ok(s),
        other => Err(type_mismatch(function, index, &args[index], &other, "Str")),
    }
}

/// The shared value-to-text rule: `Void` is empty, `Int` is decimal, `Str`
/// is itself, and anything else is a type error naming the argument.
pub fn coerce_text(function: &str, index: usize, arg: &Expr, value: Expr) -> Result<String, EvalError> {
    match value {
        Expr::Void => Ok(String::new()),
        Expr::Int(n) => Ok(n.to_string()),
        Expr::Str(s) => Ok(s),
        other => Err(type_mismatch(function, index, arg, &other, "Int, Str or Void")),
    }
}

/// Evaluate every argument, coerce it to text with `map` applied to string
/// values, and join the results.
fn collect_text(
    ctx: &mut EvalContext<'_>,
    function: &str,
    args: &[Expr],
    map: impl Fn(&str) -> String,
) -> Result<String, EvalError> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        match ctx.evaluate(arg)? {
            Expr::Str(s) => out.push_str(&map(&s)),
            other => out.push_str(&coerce_text(function, i, arg, other)?),
        }
    }
    Ok(out)
}

// ── Control ───────────────────────────────────────────────────────────────────

fn builtin_do(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    ctx.evaluate_sequence(args)?;
    Ok(Expr::Void)
}

/// `let(name1(value…), name2(value…), …, body)`
///
/// Binding values are evaluated once, in order, in the enclosing scope, so
/// siblings cannot see each other.  The body then runs in a new scope that
/// holds the bindings; the scope is popped however the body finishes.
fn builtin_let(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let Some((body, binds)) = args.split_last() else {
        return Ok(Expr::Void);
    };

    let mut calls: Vec<&Funcall> = Vec::with_capacity(binds.len());
    for bind in binds {
        let Expr::Funcall(call) = bind else {
            return Err(EvalError::InvalidBinding(bind.to_string()));
        };
        if ctx.is_builtin(&call.name) {
            // With one binding there is no stray statement to blame.
            return Err(if binds.len() == 1 {
                EvalError::ReservedBindingName(call.name.clone())
            } else {
                EvalError::BodyNotSequence {
                    binding: bind.to_string(),
                    name: call.name.clone(),
                }
            });
        }
        if calls.iter().any(|seen| seen.name == call.name) {
            return Err(EvalError::DuplicateBinding(call.name.clone()));
        }
        calls.push(call);
    }

    let mut scope = Scope::new();
    for call in calls {
        let value = ctx.evaluate_sequence(&call.args)?;
        scope.bind(call.name.as_str(), Binding::Value(value))?;
    }
    ctx.with_scope(scope, |ctx| ctx.evaluate(body))
}

fn builtin_or(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    for arg in args {
        let value = ctx.evaluate(arg)?;
        if value.is_truthy() {
            return Ok(value);
        }
    }
    Ok(Expr::Void)
}

fn builtin_choice(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("choice", args, Arity::AtLeast(1))?;
    let index = ctx.rng().gen_range(0..args.len());
    ctx.evaluate(&args[index])
}

// ── Text ──────────────────────────────────────────────────────────────────────

fn builtin_concat(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    collect_text(ctx, "concat", args, str::to_owned).map(Expr::Str)
}

fn builtin_say(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let text = collect_text(ctx, "say", args, str::to_owned)?;
    ctx.env().send_message(&text);
    Ok(Expr::Void)
}

fn builtin_uppercase(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    collect_text(ctx, "uppercase", args, str::to_uppercase).map(Expr::Str)
}

fn builtin_urlencode(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let text = collect_text(ctx, "urlencode", args, str::to_owned)?;
    Ok(Expr::Str(path_escape(&text)))
}

fn builtin_fancy(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let on_discord = ctx.env().platform() == Platform::Discord;
    let map = |s: &str| {
        if on_discord {
            fancy_discord(s)
        } else {
            fancy(s)
        }
    };
    collect_text(ctx, "fancy", args, map).map(Expr::Str)
}

fn builtin_replace(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    const NAME: &str = "replace";
    expect_arity(NAME, args, Arity::Exactly(3))?;
    let pattern = eval_str(ctx, NAME, args, 0)?;
    let src = eval_str(ctx, NAME, args, 1)?;
    let replacement = eval_str(ctx, NAME, args, 2)?;
    let re = Regex::new(&pattern).map_err(|e| EvalError::InvalidArgument {
        function: NAME.to_owned(),
        message: format!("could not compile regexp `{pattern}`: {e}"),
    })?;
    Ok(Expr::Str(re.replace_all(&src, replacement.as_str()).into_owned()))
}

/// Percent-encode everything except the characters allowed unescaped in a
/// URL path segment.
pub fn path_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b',' | b':' | b';' | b'=' | b'@');
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Map ASCII letters to MATHEMATICAL BOLD SCRIPT letters.
pub fn fancy(s: &str) -> String {
    s.chars().map(fancy_char).collect()
}

fn fancy_char(c: char) -> char {
    let code = match c {
        'A'..='Z' => 0x1D4D0 + (c as u32 - 'A' as u32),
        'a'..='z' => 0x1D4EA + (c as u32 - 'a' as u32),
        _ => return c,
    };
    char::from_u32(code).unwrap_or(c)
}

fn discord_emoji() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<:[a-zA-Z_0-9]+:[0-9]+>").ok())
        .as_ref()
}

/// [`fancy`], leaving Discord custom emoji such as `<:pog:123>` intact.
pub fn fancy_discord(s: &str) -> String {
    let Some(emoji) = discord_emoji() else {
        return fancy(s);
    };
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for m in emoji.find_iter(s) {
        out.push_str(&fancy(&s[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&fancy(&s[last..]));
    out
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

fn builtin_add(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let mut sum: i64 = 0;
    for i in 0..args.len() {
        let n = eval_int(ctx, "add", args, i)?;
        sum = sum
            .checked_add(n)
            .ok_or_else(|| EvalError::IntegerOverflow("add".into()))?;
    }
    Ok(Expr::Int(sum))
}

fn builtin_sub(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let overflow = || EvalError::IntegerOverflow("sub".into());
    if args.is_empty() {
        return Ok(Expr::Int(0));
    }
    let first = eval_int(ctx, "sub", args, 0)?;
    if args.len() == 1 {
        return first.checked_neg().map(Expr::Int).ok_or_else(overflow);
    }
    let mut acc = first;
    for i in 1..args.len() {
        let n = eval_int(ctx, "sub", args, i)?;
        acc = acc.checked_sub(n).ok_or_else(overflow)?;
    }
    Ok(Expr::Int(acc))
}

// ── Environment ───────────────────────────────────────────────────────────────

fn builtin_author(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("author", args, Arity::Exactly(0))?;
    Ok(Expr::Str(ctx.env().author_mention()))
}

fn builtin_admin(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("admin", args, Arity::Exactly(0))?;
    Ok(Expr::Str(ctx.env().admin_mention()))
}

fn builtin_privileged(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("privileged", args, Arity::Exactly(0))?;
    Ok(Expr::Int(i64::from(ctx.env().is_author_privileged())))
}

fn builtin_count(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("count", args, Arity::Exactly(0))?;
    Ok(Expr::Int(ctx.invocation().count))
}

fn builtin_input(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("input", args, Arity::Exactly(0))?;
    Ok(Expr::Str(ctx.invocation().input.clone()))
}

fn builtin_discord(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    let env = ctx.env();
    if env.platform() != Platform::Discord {
        env.send_message(&format!(
            "{} This command is only for discord, sorry",
            env.author_mention()
        ));
        return Ok(Expr::Void);
    }
    ctx.evaluate_sequence(args)
}

fn builtin_twitch_or_discord(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("twitch_or_discord", args, Arity::Exactly(2))?;
    if ctx.env().platform() == Platform::Discord {
        ctx.evaluate(&args[1])
    } else {
        ctx.evaluate(&args[0])
    }
}

// ── Time ──────────────────────────────────────────────────────────────────────

fn builtin_year(_ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    expect_arity("year", args, Arity::Exactly(0))?;
    Ok(Expr::Int(i64::from(Utc::now().year())))
}

fn builtin_days_left_until(ctx: &mut EvalContext<'_>, args: &[Expr]) -> Result<Expr, EvalError> {
    const NAME: &str = "days_left_until";
    expect_arity(NAME, args, Arity::Exactly(1))?;
    let text = eval_str(ctx, NAME, args, 0)?;
    let invalid = || EvalError::InvalidArgument {
        function: NAME.to_owned(),
        message: format!("`{text}` is not a valid date. Expected format YYYY-MM-DD."),
    };
    let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| invalid())?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    let target = Utc.from_utc_datetime(&midnight);
    let seconds = (target - Utc::now()).num_seconds();
    Ok(Expr::Int(seconds_to_days_ceil(seconds)))
}

fn seconds_to_days_ceil(seconds: i64) -> i64 {
    const DAY: i64 = 24 * 60 * 60;
    seconds.div_euclid(DAY) + i64::from(seconds.rem_euclid(DAY) != 0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
