// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `portvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portvisor",
    version,
    about = "Start, stop and watch local Node.js servers by name.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `PORTVISOR_CONFIG`, then `Portvisor.toml` in the current
    /// directory, then the built-in server table.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PORTVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List configured servers.
    List,
    /// Show liveness, pid, URL and last log line.
    Status {
        /// Server key; all servers when omitted.
        key: Option<String>,
    },
    /// Start a server and follow its output until Ctrl-C.
    Start { key: String },
    /// Stop a server, including one started elsewhere.
    Stop { key: String },
    /// Restart a server and follow its output until Ctrl-C.
    Restart { key: String },
    /// Interactive session reading commands from stdin.
    Console,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
