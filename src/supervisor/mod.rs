// src/supervisor/mod.rs

//! Lifecycle management for one externally defined server process.
//!
//! - [`descriptor`] is the immutable description of a server (dir, entry, port).
//! - [`log_buffer`] is the bounded, timestamped record of child output.
//! - [`drain`] owns the background task that copies child output into it.
//! - [`process`] holds [`Supervisor`] itself: `is_running`, `start`, `stop`,
//!   `restart`, `recent_logs`.

pub mod descriptor;
pub mod drain;
pub mod log_buffer;
pub mod process;

pub use descriptor::ServerDescriptor;
pub use log_buffer::{LogBuffer, LogEntry};
pub use process::{StatusReport, Supervisor};

use std::fmt;

/// Result of a lifecycle operation.
///
/// Lifecycle operations never fail with an error; a misbehaving child only
/// ever shows up as `success == false` plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Answer to "is this server running?", with how it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Our own child, still alive.
    Owned { pid: u32 },
    /// A process of the expected runtime holds the port (adopted).
    ListeningOnPort { pid: u32 },
    /// A process whose command line mentions the entry point (adopted).
    MatchedCommandLine { pid: u32 },
    NotRunning,
}

impl Liveness {
    pub fn is_running(&self) -> bool {
        !matches!(self, Liveness::NotRunning)
    }

    pub fn pid(&self) -> Option<u32> {
        match *self {
            Liveness::Owned { pid }
            | Liveness::ListeningOnPort { pid }
            | Liveness::MatchedCommandLine { pid } => Some(pid),
            Liveness::NotRunning => None,
        }
    }

    pub fn is_adopted(&self) -> bool {
        matches!(
            self,
            Liveness::ListeningOnPort { .. } | Liveness::MatchedCommandLine { .. }
        )
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Owned { pid } => write!(f, "running (pid {pid})"),
            Liveness::ListeningOnPort { pid } => {
                write!(f, "running (pid {pid}, adopted via port)")
            }
            Liveness::MatchedCommandLine { pid } => {
                write!(f, "running (pid {pid}, adopted via command line)")
            }
            Liveness::NotRunning => f.write_str("stopped"),
        }
    }
}

/// Whether a running server was spawned here or merely discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Adopted,
}

/// Last known lifecycle phase.
///
/// Updated by lifecycle operations only: a child that dies on its own keeps
/// reporting `Running` until the next `is_running()` notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Starting,
    Running(Ownership),
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Stopped => f.write_str("stopped"),
            Phase::Starting => f.write_str("starting"),
            Phase::Running(Ownership::Owned) => f.write_str("running"),
            Phase::Running(Ownership::Adopted) => f.write_str("running (adopted)"),
            Phase::Stopping => f.write_str("stopping"),
        }
    }
}
