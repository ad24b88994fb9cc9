//! Command-line argument parsing.
//!
//! Usage:
//!   gk [-c <config>] [-s <store>] [-u <user>] [--admin] [--platform <p>]
//!      [-e <command line>]... [--debug]
//!
//! Without `-e` the bot reads chat lines from stdin until EOF or ctrl-c.

use std::path::PathBuf;

use clap::Parser;

use crate::env::Platform;

/// Gatekeeper chat bot, console edition.
#[derive(Debug, Parser)]
#[command(name = "gk", version)]
#[command(about = "Run gatekeeper commands from the terminal")]
pub struct Cli {
    /// Config file (default: platform config dir, `gk.toml`)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Command store file, overriding `store_path` from the config
    #[arg(short, long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Keep commands in memory only
    #[arg(long, conflicts_with = "store")]
    pub memory: bool,

    /// Name the console user is addressed by
    #[arg(short, long, default_value = "console")]
    pub user: String,

    /// Treat the console user as the bot administrator
    #[arg(long)]
    pub admin: bool,

    /// Platform scripts see through `discord()` and `twitch_or_discord()`
    #[arg(long, default_value = "none", value_parser = parse_platform)]
    pub platform: Platform,

    /// Run this command line and exit instead of reading stdin (repeatable)
    #[arg(short, long = "exec", value_name = "LINE")]
    pub exec: Vec<String>,

    /// Log at debug level
    #[arg(short, long)]
    pub debug: bool,
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
