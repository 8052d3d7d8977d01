// src/console.rs

//! Interactive command session and the text rendering shared with the
//! one-shot CLI subcommands.

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::registry::Registry;

/// Default number of lines shown by `logs <key>`.
pub const DEFAULT_LOG_LINES: usize = 20;

const PROMPT: &str = "portvisor> ";

const HELP: &str = "\
commands:
  list                 configured servers
  status [key]         liveness of one or all servers
  start <key>          start a server
  stop <key>           stop a server
  restart <key>        stop, pause, start
  logs <key> [n]       last n log lines (default 20)
  help                 this text
  quit | exit          leave (servers keep running)";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Status(Option<String>),
    Start(String),
    Stop(String),
    Restart(String),
    Logs { key: String, count: usize },
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = words.collect();

        let one_key = |verb: &str| match args.as_slice() {
            [key] => Ok((*key).to_string()),
            _ => Err(format!("usage: {verb} <key>")),
        };

        match verb.to_lowercase().as_str() {
            "list" | "ls" => Ok(ConsoleCommand::List),
            "status" => match args.as_slice() {
                [] => Ok(ConsoleCommand::Status(None)),
                [key] => Ok(ConsoleCommand::Status(Some((*key).to_string()))),
                _ => Err("usage: status [key]".to_string()),
            },
            "start" => one_key("start").map(ConsoleCommand::Start),
            "stop" => one_key("stop").map(ConsoleCommand::Stop),
            "restart" => one_key("restart").map(ConsoleCommand::Restart),
            "logs" => match args.as_slice() {
                [key] => Ok(ConsoleCommand::Logs {
                    key: (*key).to_string(),
                    count: DEFAULT_LOG_LINES,
                }),
                [key, n] => n
                    .parse::<usize>()
                    .map(|count| ConsoleCommand::Logs {
                        key: (*key).to_string(),
                        count,
                    })
                    .map_err(|_| format!("invalid line count '{n}'")),
                _ => Err("usage: logs <key> [n]".to_string()),
            },
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

/// Text produced by one command, and whether it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub success: bool,
    pub text: String,
}

impl Reply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    fn failed(text: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
        }
    }
}

/// Run one command against `registry`. `Quit` is a no-op here.
pub async fn execute(registry: &Registry, command: &ConsoleCommand) -> Reply {
    match command {
        ConsoleCommand::List => Reply::ok(render_list(registry)),
        ConsoleCommand::Status(key) => render_status(registry, key.as_deref()).await,
        ConsoleCommand::Start(key) => lifecycle(registry, key, Lifecycle::Start).await,
        ConsoleCommand::Stop(key) => lifecycle(registry, key, Lifecycle::Stop).await,
        ConsoleCommand::Restart(key) => lifecycle(registry, key, Lifecycle::Restart).await,
        ConsoleCommand::Logs { key, count } => match registry.get(key) {
            Ok(supervisor) => {
                let lines = supervisor.recent_logs(*count);
                if lines.is_empty() {
                    Reply::ok(format!("no log entries for '{key}'"))
                } else {
                    Reply::ok(lines.join("\n"))
                }
            }
            Err(e) => Reply::failed(e.to_string()),
        },
        ConsoleCommand::Help => Reply::ok(HELP),
        ConsoleCommand::Quit => Reply::ok(""),
    }
}

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Start,
    Stop,
    Restart,
}

async fn lifecycle(registry: &Registry, key: &str, op: Lifecycle) -> Reply {
    let supervisor = match registry.get(key) {
        Ok(s) => s,
        Err(e) => return Reply::failed(e.to_string()),
    };

    let outcome = match op {
        Lifecycle::Start => supervisor.start().await,
        Lifecycle::Stop => supervisor.stop().await,
        Lifecycle::Restart => supervisor.restart().await,
    };
    debug!(server = %key, ?op, success = outcome.success, "lifecycle command finished");

    let name = &supervisor.descriptor().name;
    let text = format!("{name}: {}", outcome.message);
    if outcome.success {
        Reply::ok(text)
    } else {
        Reply::failed(text)
    }
}

/// One line per configured server.
pub fn render_list(registry: &Registry) -> String {
    let mut out = String::new();
    for (key, supervisor) in registry.iter() {
        let d = supervisor.descriptor();
        let _ = writeln!(
            out,
            "{key:<14} {:<20} port {:<5}  {}  ({})",
            d.name,
            d.port,
            d.working_dir.display(),
            d.entry_point
        );
    }
    out.trim_end().to_string()
}

/// Status block for one server, or for every server when `key` is `None`.
pub async fn render_status(registry: &Registry, key: Option<&str>) -> Reply {
    let targets = match key {
        Some(key) => match registry.get(key) {
            Ok(s) => vec![s],
            Err(e) => return Reply::failed(e.to_string()),
        },
        None => registry.iter().map(|(_, s)| s.clone()).collect(),
    };

    let mut blocks = Vec::with_capacity(targets.len());
    for supervisor in targets {
        blocks.push(supervisor.status().await.to_string());
    }
    Reply::ok(blocks.join("\n\n"))
}

/// Read commands from `input` until EOF or `quit`, writing replies to `out`.
///
/// Servers started during the session keep running after it ends.
pub async fn run_console<R, W>(registry: &Registry, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    info!(servers = registry.len(), "console session started");
    writeln!(out, "{HELP}")?;

    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(problem) => {
                writeln!(out, "{problem}\n{HELP}")?;
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }

        let reply = execute(registry, &command).await;
        writeln!(out, "{}", reply.text)?;
    }

    info!("console session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ConsoleCommand {
        line.parse().unwrap()
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(parse("list"), ConsoleCommand::List);
        assert_eq!(parse("status"), ConsoleCommand::Status(None));
        assert_eq!(parse("status email"), ConsoleCommand::Status(Some("email".into())));
        assert_eq!(parse("  START email "), ConsoleCommand::Start("email".into()));
        assert_eq!(parse("stop videoemail"), ConsoleCommand::Stop("videoemail".into()));
        assert_eq!(parse("restart x"), ConsoleCommand::Restart("x".into()));
        assert_eq!(
            parse("logs email"),
            ConsoleCommand::Logs { key: "email".into(), count: DEFAULT_LOG_LINES }
        );
        assert_eq!(
            parse("logs email 5"),
            ConsoleCommand::Logs { key: "email".into(), count: 5 }
        );
        assert_eq!(parse("help"), ConsoleCommand::Help);
        assert_eq!(parse("quit"), ConsoleCommand::Quit);
        assert_eq!(parse("exit"), ConsoleCommand::Quit);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("start".parse::<ConsoleCommand>().is_err());
        assert!("stop a b".parse::<ConsoleCommand>().is_err());
        assert!("logs email many".parse::<ConsoleCommand>().is_err());
        let err = "deploy email".parse::<ConsoleCommand>().unwrap_err();
        assert_eq!(err, "unknown command 'deploy'");
    }
}
