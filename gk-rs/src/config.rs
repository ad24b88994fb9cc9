//! `gk.toml` configuration file.
//!
//! Every key is optional; a missing file is the same as an empty one.
//!
//! | Key | Default | Meaning |
//! |-----|---------|---------|
//! | `command_prefix` | `"$!"` | characters that may start a command |
//! | `eval_budget` | `100` | nodes evaluated per invocation |
//! | `max_depth` | `64` | maximum expression nesting during evaluation |
//! | `store_path` | `<data dir>/commands.toml` | command store file |
//! | `admin` | `"admin"` | display name of the bot administrator |
//! | `log_filter` | unset | tracing filter, e.g. `"gk=debug"` |
//! | `[settings] weighted_branching` | `true` | initial [`Settings`] snapshot |

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::script::Limits;

// ── Public API ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime toggles that admin commands may change while the bot runs.  The
/// registry holds one immutable snapshot and swaps it as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Whether text generators pick branches by frequency weight.
    pub weighted_branching: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            weighted_branching: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub command_prefix: String,
    pub eval_budget: u32,
    pub max_depth: usize,
    pub store_path: Option<PathBuf>,
    pub admin: String,
    pub log_filter: Option<String>,
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            command_prefix: "$!".to_owned(),
            eval_budget: limits.budget,
            max_depth: limits.max_depth,
            store_path: None,
            admin: "admin".to_owned(),
            log_filter: None,
            settings: Settings::default(),
        }
    }
}

impl Config {
    /// Parse and validate a config string.
    pub fn load_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file from disk.  A missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::load_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                key: "command_prefix",
                message: "must contain at least one character".into(),
            });
        }
        if self.eval_budget == 0 {
            return Err(ConfigError::Invalid {
                key: "eval_budget",
                message: "must be greater than zero".into(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "max_depth",
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            budget: self.eval_budget,
            max_depth: self.max_depth,
        }
    }

    /// The configured store file, or the platform data directory default.
    /// `None` only when no home directory can be determined.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(|| project_dirs().map(|d| d.data_dir().join("commands.toml")))
    }
}

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("gk.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "gatekeeper")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_default() {
        assert_eq!(Config::load_str("").unwrap(), Config::default());
        let cfg = Config::default();
        assert_eq!(cfg.command_prefix, "$!");
        assert_eq!(cfg.limits(), Limits { budget: 100, max_depth: 64 });
        assert!(cfg.settings.weighted_branching);
    }

    #[test]
    fn full_file() {
        let cfg = Config::load_str(
            r#"
            command_prefix = "!"
            eval_budget = 500
            max_depth = 32
            store_path = "/tmp/gk/commands.toml"
            admin = "root"
            log_filter = "gk=debug"

            [settings]
            weighted_branching = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.command_prefix, "!");
        assert_eq!(cfg.limits(), Limits { budget: 500, max_depth: 32 });
        assert_eq!(cfg.store_path(), Some(PathBuf::from("/tmp/gk/commands.toml")));
        assert_eq!(cfg.admin, "root");
        assert_eq!(cfg.log_filter.as_deref(), Some("gk=debug"));
        assert!(!cfg.settings.weighted_branching);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            Config::load_str("budget = 5"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::load_str("[settings]\nweighted = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn wrong_type_rejected() {
        assert!(matches!(
            Config::load_str("eval_budget = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            Config::load_str("eval_budget = 0"),
            Err(ConfigError::Invalid { key: "eval_budget", .. })
        ));
        assert!(matches!(
            Config::load_str("max_depth = 0"),
            Err(ConfigError::Invalid { key: "max_depth", .. })
        ));
        assert!(matches!(
            Config::load_str("command_prefix = \"\""),
            Err(ConfigError::Invalid { key: "command_prefix", .. })
        ));
    }

    #[test]
    fn load_file_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gk.toml");
        std::fs::write(&path, "admin = \"tsoding\"\n").unwrap();
        assert_eq!(Config::load_file(&path).unwrap().admin, "tsoding");
    }
}
