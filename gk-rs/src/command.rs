//! Command-syntax extraction from raw chat text.
//!
//! A chat line is a command when it starts with one of the configured prefix
//! characters followed by a name of ASCII letters, digits, `-` or `_`.
//! Everything after the first run of spaces is the command's argument text.
//!
//! ```text
//!   $!addcmd  hello  say("hi")
//!   ^ prefix  ^name  ^args
//! ```

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SyntaxError {
    #[error("command prefix must contain at least one character")]
    EmptyPrefix,
    #[error("invalid command prefix: {0}")]
    Regex(#[from] regex::Error),
}

/// One command extracted from a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub prefix: String,
    pub name: String,
    pub args: String,
}

/// Compiled matchers for one prefix configuration.
#[derive(Debug, Clone)]
pub struct CommandSyntax {
    prefixed: Regex,
    unprefixed: Regex,
}

const NAME_AND_ARGS: &str = r"([a-zA-Z0-9\-_]+)(?: +(.*))?";

impl CommandSyntax {
    /// Build matchers accepting any single character of `prefix_chars` as
    /// the prefix.
    pub fn new(prefix_chars: &str) -> Result<Self, SyntaxError> {
        if prefix_chars.is_empty() {
            return Err(SyntaxError::EmptyPrefix);
        }
        let class: String = prefix_chars
            .chars()
            .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
            .collect();
        let prefixed = Regex::new(&format!("(?s)^ *([{class}]) *{NAME_AND_ARGS}$"))?;
        let unprefixed = Regex::new(&format!("(?s)^ *{NAME_AND_ARGS}$"))?;
        Ok(Self {
            prefixed,
            unprefixed,
        })
    }

    /// Extract a prefixed command from `line`, or `None` if it is ordinary
    /// chat.
    pub fn parse(&self, line: &str) -> Option<Command> {
        let caps = self.prefixed.captures(line)?;
        Some(Command {
            prefix: caps[1].to_owned(),
            name: caps[2].to_owned(),
            args: caps.get(3).map_or_else(String::new, |m| m.as_str().to_owned()),
        })
    }

    /// Split `text` into a command name and the rest, with no prefix.  Used
    /// by the authoring commands, whose argument starts with a name.
    pub fn parse_unprefixed(&self, text: &str) -> Option<Command> {
        let caps = self.unprefixed.captures(text)?;
        Some(Command {
            prefix: String::new(),
            name: caps[1].to_owned(),
            args: caps.get(2).map_or_else(String::new, |m| m.as_str().to_owned()),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax() -> CommandSyntax {
        CommandSyntax::new("$!").unwrap()
    }

    #[test]
    fn plain_command() {
        let cmd = syntax().parse("!ping").unwrap();
        assert_eq!(cmd.prefix, "!");
        assert_eq!(cmd.name, "ping");
        assert_eq!(cmd.args, "");
    }

    #[test]
    fn command_with_args() {
        let cmd = syntax().parse("  $ addcmd   hello say(\"hi\")").unwrap();
        assert_eq!(cmd.prefix, "$");
        assert_eq!(cmd.name, "addcmd");
        assert_eq!(cmd.args, "hello say(\"hi\")");
    }

    #[test]
    fn args_may_span_lines() {
        let cmd = syntax().parse("!eval say(1)\nsay(2)").unwrap();
        assert_eq!(cmd.args, "say(1)\nsay(2)");
    }

    #[test]
    fn ordinary_chat_is_not_a_command() {
        assert!(syntax().parse("hello there").is_none());
        assert!(syntax().parse("#ping").is_none());
        assert!(syntax().parse("!").is_none());
        assert!(syntax().parse("!pi.ng").is_none());
    }

    #[test]
    fn name_must_be_followed_by_space() {
        assert!(syntax().parse("!ping(1)").is_none());
    }

    #[test]
    fn regex_metacharacters_in_prefix() {
        let syntax = CommandSyntax::new("^]-").unwrap();
        assert_eq!(syntax.parse("]go").unwrap().name, "go");
        assert_eq!(syntax.parse("-go").unwrap().name, "go");
        assert_eq!(syntax.parse("^go").unwrap().name, "go");
        assert!(syntax.parse("!go").is_none());
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(matches!(CommandSyntax::new(""), Err(SyntaxError::EmptyPrefix)));
    }

    #[test]
    fn unprefixed() {
        let cmd = syntax().parse_unprefixed("hello say(\"hi\")").unwrap();
        assert_eq!(cmd.name, "hello");
        assert_eq!(cmd.args, "say(\"hi\")");
        assert!(syntax().parse_unprefixed("bad!name").is_none());
        assert!(syntax().parse_unprefixed("").is_none());
    }
}
