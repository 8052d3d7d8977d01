// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod host;
pub mod logging;
pub mod registry;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::resolve_config;
use crate::console::{ConsoleCommand, execute, run_console};
use crate::host::SystemHost;
use crate::registry::Registry;
use crate::supervisor::Supervisor;

/// How often `start`/`restart` poll for new log lines while following.
const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when the requested operation ran but failed, so the
/// binary can exit non-zero without printing an error chain.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = resolve_config(args.config.as_deref())?;
    debug!(servers = cfg.servers.len(), "configuration loaded");

    let registry = Registry::from_config(&cfg, Arc::new(SystemHost));

    match args.command {
        Command::List => one_shot(&registry, ConsoleCommand::List).await,
        Command::Status { key } => one_shot(&registry, ConsoleCommand::Status(key)).await,
        Command::Stop { key } => one_shot(&registry, ConsoleCommand::Stop(key)).await,
        Command::Start { key } => start_and_follow(&registry, &key, false).await,
        Command::Restart { key } => start_and_follow(&registry, &key, true).await,
        Command::Console => {
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            run_console(&registry, stdin, &mut stdout).await?;
            Ok(true)
        }
    }
}

async fn one_shot(registry: &Registry, command: ConsoleCommand) -> Result<bool> {
    let reply = execute(registry, &command).await;
    if reply.success {
        println!("{}", reply.text);
    } else {
        eprintln!("{}", reply.text);
    }
    Ok(reply.success)
}

/// Start (or restart) `key`, then stream its log to stdout.
///
/// Ctrl-C stops the server and returns. If the server goes away on its own
/// the function returns `Ok(false)`.
async fn start_and_follow(registry: &Registry, key: &str, restart: bool) -> Result<bool> {
    let supervisor = registry.get(key)?;
    let mut mark = supervisor.logs().mark();

    let outcome = if restart {
        supervisor.restart().await
    } else {
        supervisor.start().await
    };
    let name = supervisor.descriptor().name.clone();

    if !outcome.success {
        eprintln!("{name}: {}", outcome.message);
        return Ok(false);
    }
    println!("{name}: {}", outcome.message);
    println!(
        "following {} on {} (Ctrl-C to stop)",
        name,
        supervisor.descriptor().url()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = interval(FOLLOW_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                info!(server = %key, "interrupted; stopping server");
                mark = print_since(&supervisor, mark);
                let stopped = supervisor.stop().await;
                print_since(&supervisor, mark);
                println!("{name}: {}", stopped.message);
                return Ok(stopped.success);
            }
            _ = ticker.tick() => {
                mark = print_since(&supervisor, mark);
                if !supervisor.is_running().await.is_running() {
                    print_since(&supervisor, mark);
                    eprintln!("{name} is no longer running");
                    return Ok(false);
                }
            }
        }
    }
}

fn print_since(supervisor: &Supervisor, mark: u64) -> u64 {
    let (entries, next) = supervisor.logs().since(mark);
    for entry in entries {
        println!("{entry}");
    }
    next
}
