// src/host/mod.rs

//! Operating-system facilities the supervisor relies on.
//!
//! The supervisor talks to a [`ProcessHost`] instead of calling `procfs` or
//! `nix` directly. Production code uses [`SystemHost`]; tests can swap in the
//! in-memory [`mock::MockHost`] to simulate foreign processes holding a port.

use std::fmt::Debug;

use crate::errors::Result;

pub mod mock;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod unsupported;

/// A process as seen by a host scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Executable name (`comm` on Linux), e.g. `"node"`.
    pub name: String,
}

/// Signals the supervisor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// SIGTERM: ask the process to exit.
    Terminate,
    /// SIGKILL: no negotiation.
    Kill,
}

/// What happened when a signal was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    Delivered,
    /// The target was already gone.
    NoSuchProcess,
}

/// Abstract process/port inspection and signalling.
///
/// Scans return `Err` only when the host facility as a whole is unavailable
/// (e.g. the socket tables cannot be read). Individual processes that cannot
/// be inspected are skipped.
pub trait ProcessHost: Send + Sync + Debug {
    /// Processes holding a LISTEN socket on `port`.
    fn listeners_on(&self, port: u16) -> Result<Vec<ProcessInfo>>;

    /// Processes whose command line contains `needle`.
    ///
    /// The calling process itself is never returned.
    fn find_by_cmdline(&self, needle: &str) -> Result<Vec<ProcessInfo>>;

    /// Deliver `signal` to `pid`.
    fn signal(&self, pid: u32, signal: HostSignal) -> Result<SignalDelivery>;

    /// Whether `pid` still refers to a live (non-zombie) process.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Implementation backed by the real operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemHost;
