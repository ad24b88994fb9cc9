//! Command registry: resolves a command name and runs it.
//!
//! Resolution order for an invoked name:
//!
//! 1. a script stored under that name in the [`CommandStore`];
//! 2. the fixed table of builtin commands (`addcmd`, `eval`, `cyril`, …);
//! 3. handlers registered through [`Registry::with_host_command`];
//! 4. otherwise the author is told the command does not exist.
//!
//! Every invocation is isolated: whatever goes wrong is reported to the
//! author (or logged) and the registry stays usable.  Storage errors are
//! logged in full but shown to chat only as a generic message.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::command::{Command, CommandSyntax, SyntaxError};
use crate::config::{Config, Settings};
use crate::env::{cyrillify, Cyrillify, Environment, Profiling};
use crate::script::{parse_all, EvalContext, Expr, Invocation, Limits, ScriptError};
use crate::store::{CommandStore, StorageError, StoredCommand, Upsert};

/// Names handled by the registry itself, before host commands.
pub const BUILTIN_COMMANDS: &[&str] = &[
    "addcmd",
    "updcmd",
    "delcmd",
    "showcmd",
    "eval",
    "profile",
    "cyril",
    "version",
    "weighted",
    "unweighted",
    "isweighted",
];

/// What an invoked name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// Not stored; dispatched to the builtin table.
    Builtin,
    Stored(StoredCommand),
}

/// How an invocation ended.  The author has already been answered through
/// the environment in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A stored script ran to completion with this result.
    Script(Expr),
    /// A builtin or host command handled the invocation.
    Handled,
    /// A stored script or `eval` input failed to parse or evaluate.
    ScriptFailed(ScriptError),
    /// An admin-only command was invoked by someone else.
    Denied,
    /// The argument text did not have the expected shape.
    BadSyntax,
    /// No command of that name exists.
    Unknown,
    /// An internal failure: storage or a host command.
    Failed,
}

// ── Host commands ─────────────────────────────────────────────────────────────

/// Everything a host command gets to see.
pub struct HostContext<'a> {
    pub env: &'a dyn Environment,
    pub command: &'a Command,
    /// Settings snapshot current when the command was invoked.
    pub settings: Settings,
}

/// A command implemented by the embedding host, e.g. a text generator or a
/// weather lookup.
pub trait HostCommand: Send + Sync {
    /// Restrict the command to privileged authors.
    fn admin_only(&self) -> bool {
        false
    }

    /// Run the command.  Replies go through `ctx.env`; an `Err` is logged
    /// and the author is told something went wrong.
    fn run(&self, ctx: &HostContext<'_>) -> anyhow::Result<()>;
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct Registry {
    store: Arc<dyn CommandStore>,
    syntax: CommandSyntax,
    limits: Limits,
    settings: RwLock<Settings>,
    host: HashMap<String, Box<dyn HostCommand>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut host: Vec<&str> = self.host.keys().map(String::as_str).collect();
        host.sort_unstable();
        f.debug_struct("Registry")
            .field("syntax", &self.syntax)
            .field("limits", &self.limits)
            .field("settings", &*self.settings.read())
            .field("host", &host)
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(store: Arc<dyn CommandStore>, syntax: CommandSyntax, limits: Limits) -> Self {
        Self {
            store,
            syntax,
            limits,
            settings: RwLock::new(Settings::default()),
            host: HashMap::new(),
        }
    }

    /// Registry with the prefix, limits and initial settings of `config`.
    pub fn from_config(config: &Config, store: Arc<dyn CommandStore>) -> Result<Self, SyntaxError> {
        let syntax = CommandSyntax::new(&config.command_prefix)?;
        Ok(Self::new(store, syntax, config.limits()).with_settings(config.settings))
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        *self.settings.write() = settings;
        self
    }

    /// Register a host command.  Names of [`BUILTIN_COMMANDS`] are handled by
    /// the registry first and cannot be overridden.
    pub fn with_host_command(mut self, name: &str, handler: impl HostCommand + 'static) -> Self {
        if BUILTIN_COMMANDS.contains(&name) {
            warn!(command = %name, "host command shadowed by a builtin command");
        }
        self.host.insert(name.to_owned(), Box::new(handler));
        self
    }

    pub fn syntax(&self) -> &CommandSyntax {
        &self.syntax
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// The current settings snapshot.
    pub fn settings(&self) -> Settings {
        *self.settings.read()
    }

    /// Apply `f` to a copy of the settings and install it as the new
    /// snapshot, returning the old one.
    fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Settings {
        let mut current = self.settings.write();
        let previous = *current;
        let mut next = previous;
        f(&mut next);
        *current = next;
        previous
    }

    /// Look `name` up in the store.
    pub fn resolve(&self, name: &str) -> Result<CommandSource, StorageError> {
        Ok(match self.store.get(name)? {
            Some(cmd) => CommandSource::Stored(cmd),
            None => CommandSource::Builtin,
        })
    }

    /// Treat `line` as raw chat text.  `None` if it is not a command.
    pub fn handle_line(&self, line: &str, env: &dyn Environment) -> Option<Outcome> {
        let command = self.syntax.parse(line)?;
        Some(self.invoke(&command, env))
    }

    /// Run one command on behalf of the author described by `env`.
    pub fn invoke(&self, command: &Command, env: &dyn Environment) -> Outcome {
        debug!(
            command = %command.name,
            args = %command.args,
            user = %env.author_user_id(),
            "invoke"
        );
        match self.resolve(&command.name) {
            Ok(CommandSource::Stored(stored)) => self.invoke_stored(command, &stored, env),
            Ok(CommandSource::Builtin) => self.invoke_builtin(command, env),
            Err(e) => {
                error!(command = %command.name, error = %e, "could not look up command");
                something_went_wrong(env);
                Outcome::Failed
            }
        }
    }

    fn invoke_stored(&self, command: &Command, stored: &StoredCommand, env: &dyn Environment) -> Outcome {
        let author = env.author_mention();
        let exprs = match parse_all(&stored.source) {
            Ok(exprs) => exprs,
            Err(e) => {
                env.send_message(&format!(
                    "{author} Error while parsing `{}` command: {e}",
                    command.name
                ));
                return Outcome::ScriptFailed(e.into());
            }
        };

        let count = stored.count.saturating_add(1);
        let invocation = Invocation::new(command.name.as_str(), command.args.as_str(), count);
        let mut ctx = EvalContext::new(env, invocation, self.limits);
        let value = match ctx.evaluate_sequence(&exprs) {
            Ok(value) => value,
            Err(e) => {
                debug!(command = %command.name, error = %e, "evaluation failed");
                env.send_message(&format!(
                    "{author} Could not evaluate command's expression `{}`: {e}",
                    stored.source
                ));
                return Outcome::ScriptFailed(e.into());
            }
        };

        // The reply is already out; a lost count is only worth a log line.
        match self.store.increment(&command.name) {
            Ok(Some(n)) => debug!(command = %command.name, count = n, "counted"),
            Ok(None) => debug!(command = %command.name, "deleted while running"),
            Err(e) => warn!(command = %command.name, error = %e, "could not update invocation count"),
        }
        Outcome::Script(value)
    }

    // ── Builtin commands ──────────────────────────────────────────────────────

    fn invoke_builtin(&self, command: &Command, env: &dyn Environment) -> Outcome {
        let author = env.author_mention();
        let args = command.args.as_str();
        match command.name.as_str() {
            "addcmd" | "updcmd" => {
                if !admin_gate(env) {
                    return Outcome::Denied;
                }
                let Some(def) = self.syntax.parse_unprefixed(args) else {
                    return syntax_error(env);
                };
                match self.store.upsert(&def.name, &def.args) {
                    Ok(change) => {
                        let verb = match change {
                            Upsert::Added => "added",
                            Upsert::Updated => "updated",
                        };
                        info!(command = %def.name, "command {verb}");
                        env.send_message(&format!("{author} command {} is {verb}", def.name));
                        Outcome::Handled
                    }
                    Err(e) => storage_failure(env, &def.name, &e),
                }
            }
            "delcmd" => {
                if !admin_gate(env) {
                    return Outcome::Denied;
                }
                let Some(def) = self.syntax.parse_unprefixed(args) else {
                    return syntax_error(env);
                };
                match self.store.delete(&def.name) {
                    Ok(true) => {
                        info!(command = %def.name, "command deleted");
                        env.send_message(&format!("{author} deleted {}", def.name));
                        Outcome::Handled
                    }
                    Ok(false) => {
                        env.send_message(&format!("{author} command {} does not exist", def.name));
                        Outcome::Unknown
                    }
                    Err(e) => storage_failure(env, &def.name, &e),
                }
            }
            "showcmd" if args.trim().is_empty() => match self.store.names() {
                Ok(names) if names.is_empty() => {
                    env.send_message(&format!("{author} there are no commands yet"));
                    Outcome::Handled
                }
                Ok(names) => {
                    env.send_message(&format!("{author} commands: {}", names.join(", ")));
                    Outcome::Handled
                }
                Err(e) => {
                    error!(error = %e, "could not list commands");
                    something_went_wrong(env);
                    Outcome::Failed
                }
            },
            "showcmd" => {
                let Some(def) = self.syntax.parse_unprefixed(args) else {
                    return syntax_error(env);
                };
                match self.store.get(&def.name) {
                    Ok(Some(stored)) => {
                        env.send_message(&format!("{author} {}", stored.source));
                        Outcome::Handled
                    }
                    Ok(None) => {
                        env.send_message(&format!("{author} command {} does not exist", def.name));
                        Outcome::Unknown
                    }
                    Err(e) => storage_failure(env, &def.name, &e),
                }
            }
            "eval" => {
                if !admin_gate(env) {
                    return Outcome::Denied;
                }
                self.eval(args, env)
            }
            "profile" => {
                if !admin_gate(env) {
                    return Outcome::Denied;
                }
                let Some(inner) = self.syntax.parse(args) else {
                    env.send_message(&format!("{author} failed to parse inner command"));
                    return Outcome::BadSyntax;
                };
                let profiled = Profiling::new(env);
                let start = Instant::now();
                self.invoke(&inner, &profiled);
                let elapsed = start.elapsed();
                env.send_message(&format!(
                    "{author} `{args}` took {elapsed:?} to execute and sent {} messages",
                    profiled.messages_sent()
                ));
                Outcome::Handled
            }
            "cyril" => match self.syntax.parse(args) {
                Some(inner) => self.invoke(&inner, &Cyrillify::new(env)),
                None => {
                    env.send_message(&cyrillify(args));
                    Outcome::Handled
                }
            },
            "version" => {
                env.send_message(&format!("{author} {}", env!("CARGO_PKG_VERSION")));
                Outcome::Handled
            }
            "weighted" | "unweighted" => {
                if !admin_gate(env) {
                    return Outcome::Denied;
                }
                let weighted = command.name == "weighted";
                let previous = self.update_settings(|s| s.weighted_branching = weighted);
                info!(from = previous.weighted_branching, to = weighted, "weighted branching toggled");
                env.send_message(&format!("{author} switched to {} branching", command.name));
                Outcome::Handled
            }
            "isweighted" => {
                let answer = if self.settings().weighted_branching { "yes" } else { "no" };
                env.send_message(&format!("{author} {answer}"));
                Outcome::Handled
            }
            name => match self.host.get(name) {
                Some(handler) => self.run_host(handler.as_ref(), command, env),
                None => {
                    env.send_message(&format!("{author} command `{name}` does not exist"));
                    Outcome::Unknown
                }
            },
        }
    }

    /// Parse and evaluate caller-supplied script text under the usual budget.
    fn eval(&self, source: &str, env: &dyn Environment) -> Outcome {
        let author = env.author_mention();
        let exprs = match parse_all(source) {
            Ok(exprs) => exprs,
            Err(e) => {
                env.send_message(&format!("{author} could not parse expression `{source}`: {e}"));
                return Outcome::ScriptFailed(e.into());
            }
        };
        if exprs.is_empty() {
            env.send_message(&format!("{author} no expressions were provided for evaluation"));
            return Outcome::BadSyntax;
        }
        for expr in &exprs {
            trace!(tree = %expr.dump(), "eval");
        }
        let mut ctx = EvalContext::new(env, Invocation::new("eval", source, 0), self.limits);
        match ctx.evaluate_sequence(&exprs) {
            Ok(_) => Outcome::Handled,
            Err(e) => {
                env.send_message(&format!("{author} could not evaluate expression `{source}`: {e}"));
                Outcome::ScriptFailed(e.into())
            }
        }
    }

    fn run_host(&self, handler: &dyn HostCommand, command: &Command, env: &dyn Environment) -> Outcome {
        if handler.admin_only() && !admin_gate(env) {
            return Outcome::Denied;
        }
        let ctx = HostContext {
            env,
            command,
            settings: self.settings(),
        };
        match handler.run(&ctx) {
            Ok(()) => Outcome::Handled,
            Err(e) => {
                error!(command = %command.name, error = %format!("{e:#}"), "host command failed");
                something_went_wrong(env);
                Outcome::Failed
            }
        }
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// `true` if the author is privileged; otherwise tells them so.
fn admin_gate(env: &dyn Environment) -> bool {
    if env.is_author_privileged() {
        return true;
    }
    env.send_message(&format!(
        "{} only for {}",
        env.author_mention(),
        env.admin_mention()
    ));
    false
}

fn syntax_error(env: &dyn Environment) -> Outcome {
    env.send_message(&format!("{} syntax error", env.author_mention()));
    Outcome::BadSyntax
}

fn something_went_wrong(env: &dyn Environment) {
    env.send_message(&format!(
        "{} Something went wrong. Please ask {} to check the logs",
        env.author_mention(),
        env.admin_mention()
    ));
}

fn storage_failure(env: &dyn Environment, name: &str, e: &StorageError) -> Outcome {
    error!(command = %name, error = %e, "command store failure");
    something_went_wrong(env);
    Outcome::Failed
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Platform, Recording};
    use crate::script::EvalError;
    use crate::store::MemoryStore;

    fn registry(store: MemoryStore) -> Registry {
        Registry::new(
            Arc::new(store),
            CommandSyntax::new("$!").unwrap(),
            Limits::default(),
        )
    }

    fn admin() -> Recording {
        Recording::new("boss").privileged()
    }

    fn user() -> Recording {
        Recording::new("pleb")
    }

    #[test]
    fn not_a_command() {
        let reg = registry(MemoryStore::new());
        assert_eq!(reg.handle_line("just chatting", &user()), None);
    }

    #[test]
    fn stored_command_runs_and_counts() {
        let store = Arc::new(MemoryStore::new().with_command("hi", "say(\"hi \", author(), \" #\", count())"));
        let reg = Registry::new(store.clone(), CommandSyntax::new("!").unwrap(), Limits::default());
        let env = user();
        reg.handle_line("!hi", &env).unwrap();
        reg.handle_line("!hi", &env).unwrap();
        assert_eq!(env.messages(), vec!["hi @pleb #1", "hi @pleb #2"]);
        assert_eq!(store.get("hi").unwrap().map(|c| c.count), Some(2));
    }

    #[test]
    fn stored_command_sees_input() {
        let reg = registry(MemoryStore::new().with_command("echo", "say(input())"));
        let env = user();
        reg.handle_line("$echo  some words", &env).unwrap();
        assert_eq!(env.messages(), vec!["some words"]);
    }

    #[test]
    fn stored_parse_error_is_reported() {
        let reg = registry(MemoryStore::new().with_command("broken", "say(\"oops"));
        let env = user();
        let outcome = reg.handle_line("!broken", &env).unwrap();
        assert!(matches!(outcome, Outcome::ScriptFailed(ScriptError::Parse(_))));
        let sent = env.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("@pleb Error while parsing `broken` command:"));
    }

    #[test]
    fn failed_evaluation_keeps_earlier_side_effects_and_is_not_counted() {
        let store = Arc::new(MemoryStore::new().with_command("half", "say(\"a\") nope() say(\"b\")"));
        let reg = Registry::new(store.clone(), CommandSyntax::new("!").unwrap(), Limits::default());
        let env = user();
        let outcome = reg.handle_line("!half", &env).unwrap();
        assert_eq!(
            outcome,
            Outcome::ScriptFailed(ScriptError::Eval(EvalError::UnknownFunction("nope".into())))
        );
        let sent = env.messages();
        assert_eq!(sent[0], "a");
        assert!(sent[1].starts_with("@pleb Could not evaluate command's expression"));
        assert_eq!(store.get("half").unwrap().map(|c| c.count), Some(0));
    }

    #[test]
    fn budget_applies_to_stored_commands() {
        let body = format!("say({})", vec!["1"; 200].join(", "));
        let reg = registry(MemoryStore::new().with_command("big", &body));
        let outcome = reg.handle_line("!big", &user()).unwrap();
        assert_eq!(outcome, Outcome::ScriptFailed(ScriptError::Eval(EvalError::BudgetExhausted)));
    }

    #[test]
    fn unknown_command() {
        let reg = registry(MemoryStore::new());
        let env = user();
        assert_eq!(reg.handle_line("!nosuch", &env), Some(Outcome::Unknown));
        assert_eq!(env.messages(), vec!["@pleb command `nosuch` does not exist"]);
    }

    #[test]
    fn authoring_lifecycle() {
        let reg = registry(MemoryStore::new());
        let env = admin();
        reg.handle_line("!addcmd greet say(\"hello\")", &env);
        reg.handle_line("!updcmd greet say(\"hey\")", &env);
        reg.handle_line("!showcmd greet", &env);
        reg.handle_line("!greet", &env);
        reg.handle_line("!delcmd greet", &env);
        reg.handle_line("!delcmd greet", &env);
        assert_eq!(
            env.messages(),
            vec![
                "@boss command greet is added",
                "@boss command greet is updated",
                "@boss say(\"hey\")",
                "hey",
                "@boss deleted greet",
                "@boss command greet does not exist",
            ]
        );
    }

    #[test]
    fn authoring_is_admin_only() {
        let store = Arc::new(MemoryStore::new());
        let reg = Registry::new(store.clone(), CommandSyntax::new("!").unwrap(), Limits::default());
        let env = user();
        for line in ["!addcmd x 1", "!updcmd x 1", "!delcmd x", "!eval 1", "!profile !x", "!weighted"] {
            assert_eq!(reg.handle_line(line, &env), Some(Outcome::Denied), "{line}");
        }
        assert!(env.messages().iter().all(|m| m == "@pleb only for @admin"));
        assert!(store.names().unwrap().is_empty());
        assert!(reg.settings().weighted_branching);
    }

    #[test]
    fn authoring_syntax_error() {
        let reg = registry(MemoryStore::new());
        let env = admin();
        assert_eq!(reg.handle_line("!addcmd", &env), Some(Outcome::BadSyntax));
        assert_eq!(reg.handle_line("!showcmd b@d", &env), Some(Outcome::BadSyntax));
        assert_eq!(env.messages(), vec!["@boss syntax error", "@boss syntax error"]);
    }

    #[test]
    fn showcmd_without_a_name_lists_commands() {
        let reg = registry(MemoryStore::new());
        let env = user();
        assert_eq!(reg.handle_line("!showcmd", &env), Some(Outcome::Handled));
        let admin = admin();
        reg.handle_line("!addcmd zeta 1", &admin);
        reg.handle_line("!addcmd alpha 2", &admin);
        reg.handle_line("!showcmd  ", &env);
        assert_eq!(
            env.messages(),
            vec!["@pleb there are no commands yet", "@pleb commands: alpha, zeta"]
        );
    }

    #[test]
    fn eval_runs_ad_hoc_script() {
        let reg = registry(MemoryStore::new());
        let env = admin();
        assert_eq!(
            reg.handle_line("!eval say(add(34, 35)) say(count())", &env),
            Some(Outcome::Handled)
        );
        assert_eq!(env.messages(), vec!["69", "0"]);
    }

    #[test]
    fn eval_errors() {
        let reg = registry(MemoryStore::new());
        let env = admin();
        assert!(matches!(
            reg.handle_line("!eval say(", &env),
            Some(Outcome::ScriptFailed(ScriptError::Parse(_)))
        ));
        assert_eq!(reg.handle_line("!eval", &env), Some(Outcome::BadSyntax));
        assert!(matches!(
            reg.handle_line("!eval nope", &env),
            Some(Outcome::ScriptFailed(ScriptError::Eval(EvalError::UnknownVariable(_))))
        ));
        let sent = env.messages();
        assert!(sent[0].starts_with("@boss could not parse expression `say(`"));
        assert_eq!(sent[1], "@boss no expressions were provided for evaluation");
        assert!(sent[2].starts_with("@boss could not evaluate expression `nope`"));
    }

    #[test]
    fn cyril_wraps_inner_command() {
        let reg = registry(MemoryStore::new().with_command("hi", "say(\"hello\")"));
        let env = user();
        reg.handle_line("!cyril !hi", &env);
        reg.handle_line("!cyril just text", &env);
        assert_eq!(env.messages(), vec!["нёllф", "jцsт тёжт"]);
    }

    #[test]
    fn profile_reports_timing() {
        let reg = registry(MemoryStore::new().with_command("hi", "say(1) say(2)"));
        let env = admin();
        assert_eq!(reg.handle_line("!profile !hi", &env), Some(Outcome::Handled));
        let sent = env.messages();
        assert_eq!(&sent[..2], ["1", "2"]);
        assert!(sent[2].starts_with("@boss `!hi` took "));
        assert!(sent[2].ends_with("and sent 2 messages"));
        assert_eq!(reg.handle_line("!profile hi", &env), Some(Outcome::BadSyntax));
    }

    #[test]
    fn weighted_toggle_replaces_snapshot() {
        let reg = registry(MemoryStore::new());
        let env = admin();
        reg.handle_line("!unweighted", &env);
        assert!(!reg.settings().weighted_branching);
        reg.handle_line("!isweighted", &env);
        reg.handle_line("!weighted", &env);
        reg.handle_line("!isweighted", &user());
        assert!(reg.settings().weighted_branching);
        assert_eq!(
            env.messages(),
            vec![
                "@boss switched to unweighted branching",
                "@boss no",
                "@boss switched to weighted branching",
            ]
        );
    }

    #[test]
    fn version_replies() {
        let reg = registry(MemoryStore::new());
        let env = user();
        reg.handle_line("!version", &env);
        assert_eq!(env.messages(), vec![format!("@pleb {}", env!("CARGO_PKG_VERSION"))]);
    }

    struct Mode;

    impl HostCommand for Mode {
        fn run(&self, ctx: &HostContext<'_>) -> anyhow::Result<()> {
            let mode = if ctx.settings.weighted_branching { "weighted" } else { "flat" };
            ctx.env.send_message(&format!("{} {mode}", ctx.command.args));
            Ok(())
        }
    }

    #[test]
    fn host_commands_receive_settings() {
        let reg = registry(MemoryStore::new()).with_host_command("mode", Mode);
        let env = admin();
        reg.handle_line("!mode now", &env);
        reg.handle_line("!unweighted", &env);
        reg.handle_line("!mode now", &env);
        assert_eq!(env.messages()[0], "now weighted");
        assert_eq!(env.messages()[2], "now flat");
    }

    struct Failing;

    impl HostCommand for Failing {
        fn admin_only(&self) -> bool {
            true
        }

        fn run(&self, _ctx: &HostContext<'_>) -> anyhow::Result<()> {
            anyhow::bail!("upstream service is down")
        }
    }

    #[test]
    fn host_command_failure_is_generic() {
        let reg = registry(MemoryStore::new()).with_host_command("weather", Failing);
        let pleb = user();
        assert_eq!(reg.handle_line("!weather", &pleb), Some(Outcome::Denied));
        let env = admin();
        assert_eq!(reg.handle_line("!weather", &env), Some(Outcome::Failed));
        assert_eq!(
            env.messages(),
            vec!["@boss Something went wrong. Please ask @admin to check the logs"]
        );
    }

    #[test]
    fn stored_command_shadows_builtin() {
        let reg = registry(MemoryStore::new().with_command("version", "say(\"custom\")"));
        let env = user();
        reg.handle_line("!version", &env);
        assert_eq!(env.messages(), vec!["custom"]);
    }

    #[test]
    fn platform_reaches_scripts() {
        let reg = registry(
            MemoryStore::new().with_command("where", "twitch_or_discord(say(\"t\"), say(\"d\"))"),
        );
        let env = Recording::new("x").on(Platform::Discord);
        reg.handle_line("!where", &env);
        assert_eq!(env.messages(), vec!["d"]);
    }

    struct BrokenStore;

    impl CommandStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<StoredCommand>, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn upsert(&self, _: &str, _: &str) -> Result<Upsert, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn delete(&self, _: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn increment(&self, _: &str) -> Result<Option<i64>, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
        fn names(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn storage_errors_are_not_leaked() {
        let reg = Registry::new(Arc::new(BrokenStore), CommandSyntax::new("!").unwrap(), Limits::default());
        let env = user();
        assert_eq!(reg.handle_line("!anything", &env), Some(Outcome::Failed));
        let sent = env.messages();
        assert_eq!(sent, vec!["@pleb Something went wrong. Please ask @admin to check the logs"]);
        assert!(!sent[0].contains("connection refused"));
    }
}
