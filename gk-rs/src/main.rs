use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use gk::cli::Cli;
use gk::config::{default_config_path, Config};
use gk::env::Console;
use gk::store::{CommandStore, FileStore, MemoryStore};
use gk::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config ────────────────────────────────────────────────────────────────
    let config_path = cli.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    gk::logging::init(cli.debug, config.log_filter.as_deref());
    info!("gatekeeper {} starting", env!("CARGO_PKG_VERSION"));

    // ── Store ─────────────────────────────────────────────────────────────────
    let store: Arc<dyn CommandStore> = match cli.store.clone().or_else(|| config.store_path()) {
        Some(path) if !cli.memory => {
            info!(path = %path.display(), "using command store");
            Arc::new(FileStore::open(&path)?)
        }
        _ => {
            warn!("commands are kept in memory and lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = Arc::new(Registry::from_config(&config, store)?);
    let env = Arc::new(Console {
        user: cli.user.clone(),
        admin: config.admin.clone(),
        privileged: cli.admin,
        platform: cli.platform,
    });

    // ── One-shot mode ─────────────────────────────────────────────────────────
    if !cli.exec.is_empty() {
        for line in cli.exec {
            dispatch(&registry, &env, line).await?;
        }
        return Ok(());
    }

    // ── Interactive mode ──────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => dispatch(&registry, &env, line).await?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    info!("gatekeeper stopped");
    Ok(())
}

/// Run one chat line through the registry off the async runtime.
async fn dispatch(registry: &Arc<Registry>, env: &Arc<Console>, line: String) -> anyhow::Result<()> {
    let registry = Arc::clone(registry);
    let env = Arc::clone(env);
    let outcome = tokio::task::spawn_blocking(move || registry.handle_line(&line, env.as_ref()))
        .await
        .context("command task panicked")?;
    match outcome {
        Some(outcome) => debug!(?outcome, "command finished"),
        None => debug!("not a command"),
    }
    Ok(())
}
