//! The capability set commands use to act on the outside world.
//!
//! Each chat transport implements [`Environment`] once.  The evaluator and the
//! command registry only ever talk to this trait, so the same script runs
//! unchanged on Discord, Twitch, or the console.
//!
//! Cross-cutting behaviour is layered with decorators that wrap an inner
//! environment and override only what they change:
//!
//! - [`Cyrillify`] transliterates every outgoing message.
//! - [`Profiling`] counts outgoing messages while a command runs.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

// ── Platform ──────────────────────────────────────────────────────────────────

/// Which chat platform a message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    #[default]
    None,
    Discord,
    Twitch,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Platform::None => "none",
            Platform::Discord => "discord",
            Platform::Twitch => "twitch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "console" => Ok(Platform::None),
            "discord" => Ok(Platform::Discord),
            "twitch" => Ok(Platform::Twitch),
            other => Err(format!("unknown platform `{other}`")),
        }
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

pub trait Environment {
    /// Deliver a reply to the channel the command came from.
    fn send_message(&self, text: &str);

    /// How to address the author of the triggering message.
    fn author_mention(&self) -> String;

    /// How to address the bot administrator.
    fn admin_mention(&self) -> String;

    /// Stable platform-specific identifier of the author.
    fn author_user_id(&self) -> String;

    /// Whether the author may run admin-only commands.
    fn is_author_privileged(&self) -> bool;

    fn platform(&self) -> Platform;
}

// ── Cyrillify ─────────────────────────────────────────────────────────────────

/// Rewrites every outgoing message with [`cyrillify`].
pub struct Cyrillify<'a> {
    inner: &'a dyn Environment,
}

impl<'a> Cyrillify<'a> {
    pub fn new(inner: &'a dyn Environment) -> Self {
        Self { inner }
    }
}

impl Environment for Cyrillify<'_> {
    fn send_message(&self, text: &str) {
        self.inner.send_message(&cyrillify(text));
    }

    fn author_mention(&self) -> String {
        self.inner.author_mention()
    }

    fn admin_mention(&self) -> String {
        self.inner.admin_mention()
    }

    fn author_user_id(&self) -> String {
        self.inner.author_user_id()
    }

    fn is_author_privileged(&self) -> bool {
        self.inner.is_author_privileged()
    }

    fn platform(&self) -> Platform {
        self.inner.platform()
    }
}

/// Swap Latin letters for look-alike Cyrillic ones.
pub fn cyrillify(text: &str) -> String {
    text.chars().map(cyril_char).collect()
}

fn cyril_char(c: char) -> char {
    match c {
        'a' => 'д',
        'b' => 'б',
        'e' => 'ё',
        'h' => 'н',
        'k' => 'к',
        'm' => 'м',
        'n' => 'п',
        'o' => 'ф',
        'r' => 'г',
        't' => 'т',
        'u' => 'ц',
        'w' => 'ш',
        'x' => 'ж',
        'A' => 'Д',
        'E' => 'Ё',
        'G' => 'Б',
        'N' => 'Й',
        'O' => 'Ф',
        'R' => 'Я',
        'U' => 'Ц',
        'W' => 'Ш',
        'X' => 'Ж',
        'Y' => 'У',
        other => other,
    }
}

// ── Profiling ─────────────────────────────────────────────────────────────────

/// Counts messages passing through to the inner environment.
pub struct Profiling<'a> {
    inner: &'a dyn Environment,
    sent: AtomicUsize,
}

impl<'a> Profiling<'a> {
    pub fn new(inner: &'a dyn Environment) -> Self {
        Self {
            inner,
            sent: AtomicUsize::new(0),
        }
    }

    pub fn messages_sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Environment for Profiling<'_> {
    fn send_message(&self, text: &str) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.inner.send_message(text);
    }

    fn author_mention(&self) -> String {
        self.inner.author_mention()
    }

    fn admin_mention(&self) -> String {
        self.inner.admin_mention()
    }

    fn author_user_id(&self) -> String {
        self.inner.author_user_id()
    }

    fn is_author_privileged(&self) -> bool {
        self.inner.is_author_privileged()
    }

    fn platform(&self) -> Platform {
        self.inner.platform()
    }
}

// ── Console ───────────────────────────────────────────────────────────────────

/// Local transport: the "chat" is the terminal the bot was started from.
#[derive(Debug, Clone)]
pub struct Console {
    pub user: String,
    pub admin: String,
    pub privileged: bool,
    pub platform: Platform,
}

impl Environment for Console {
    fn send_message(&self, text: &str) {
        println!("{text}");
    }

    fn author_mention(&self) -> String {
        format!("@{}", self.user)
    }

    fn admin_mention(&self) -> String {
        format!("@{}", self.admin)
    }

    fn author_user_id(&self) -> String {
        self.user.clone()
    }

    fn is_author_privileged(&self) -> bool {
        self.privileged
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

// ── Recording ─────────────────────────────────────────────────────────────────

/// Environment that keeps every outgoing message in memory instead of
/// delivering it.  Useful for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct Recording {
    pub author: String,
    pub admin: String,
    pub privileged: bool,
    pub platform: Platform,
    sent: Mutex<Vec<String>>,
}

impl Recording {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            admin: "admin".to_owned(),
            ..Self::default()
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn on(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Messages sent so far.
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Drain and return all messages sent so far.
    pub fn take_messages(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Environment for Recording {
    fn send_message(&self, text: &str) {
        self.sent.lock().push(text.to_owned());
    }

    fn author_mention(&self) -> String {
        format!("@{}", self.author)
    }

    fn admin_mention(&self) -> String {
        format!("@{}", self.admin)
    }

    fn author_user_id(&self) -> String {
        self.author.clone()
    }

    fn is_author_privileged(&self) -> bool {
        self.privileged
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
