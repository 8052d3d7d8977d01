// src/host/mock.rs

use super::{HostSignal, ProcessHost, ProcessInfo, SignalDelivery};
use crate::errors::{PortvisorError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub struct MockProcess {
    pub name: String,
    pub cmdline: String,
    /// Port this process listens on, if any.
    pub listening: Option<u16>,
    /// If true, SIGTERM is swallowed and only SIGKILL removes the process.
    pub ignores_term: bool,
}

#[derive(Debug, Default)]
struct MockState {
    processes: BTreeMap<u32, MockProcess>,
    signals: Vec<(u32, HostSignal)>,
    scans_fail: bool,
    cmdline_scans_fail: bool,
    /// pid -> remaining failures; `None` fails forever.
    signal_failures: BTreeMap<u32, Option<usize>>,
}

/// In-memory process table for tests.
///
/// Clones share state, so a test can keep one handle for assertions and give
/// another to the supervisor.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a foreign process.
    pub fn add_process(&self, pid: u32, process: MockProcess) {
        let mut state = self.lock();
        state.processes.insert(pid, process);
    }

    /// Shorthand for a process named `name` listening on `port`.
    pub fn add_listener(&self, pid: u32, name: &str, port: u16) {
        self.add_process(
            pid,
            MockProcess {
                name: name.to_string(),
                cmdline: name.to_string(),
                listening: Some(port),
                ignores_term: false,
            },
        );
    }

    /// Make every subsequent scan fail (simulates e.g. EACCES on /proc).
    pub fn fail_scans(&self, fail: bool) {
        self.lock().scans_fail = fail;
    }

    /// Fail only command-line scans; port scans keep working.
    pub fn fail_cmdline_scans(&self, fail: bool) {
        self.lock().cmdline_scans_fail = fail;
    }

    /// Make every signal to `pid` fail (simulates e.g. EPERM).
    pub fn fail_signals_for(&self, pid: u32) {
        self.lock().signal_failures.insert(pid, None);
    }

    /// Make only the next `count` signals to `pid` fail.
    pub fn fail_next_signals(&self, pid: u32, count: usize) {
        self.lock().signal_failures.insert(pid, Some(count));
    }

    /// Every signal sent so far, in order.
    pub fn signals(&self) -> Vec<(u32, HostSignal)> {
        self.lock().signals.clone()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().processes.contains_key(&pid)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scan<F>(&self, keep: F) -> Result<Vec<ProcessInfo>>
    where
        F: Fn(&MockProcess) -> bool,
    {
        let state = self.lock();
        if state.scans_fail {
            return Err(PortvisorError::ScanError(
                "mock scan failure".to_string(),
            ));
        }
        Ok(state
            .processes
            .iter()
            .filter(|(_, p)| keep(p))
            .map(|(pid, p)| ProcessInfo {
                pid: *pid,
                name: p.name.clone(),
            })
            .collect())
    }
}

impl ProcessHost for MockHost {
    fn listeners_on(&self, port: u16) -> Result<Vec<ProcessInfo>> {
        self.scan(|p| p.listening == Some(port))
    }

    fn find_by_cmdline(&self, needle: &str) -> Result<Vec<ProcessInfo>> {
        if self.lock().cmdline_scans_fail {
            return Err(PortvisorError::ScanError(
                "mock cmdline scan failure".to_string(),
            ));
        }
        self.scan(|p| p.cmdline.contains(needle))
    }

    fn signal(&self, pid: u32, signal: HostSignal) -> Result<SignalDelivery> {
        let mut state = self.lock();
        state.signals.push((pid, signal));

        let fails = match state.signal_failures.get_mut(&pid) {
            Some(None) => true,
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if fails {
            return Err(PortvisorError::SignalError {
                pid,
                message: "mock signal failure".to_string(),
            });
        }

        let Some(process) = state.processes.get(&pid) else {
            return Ok(SignalDelivery::NoSuchProcess);
        };
        let dies = match signal {
            HostSignal::Terminate => !process.ignores_term,
            HostSignal::Kill => true,
        };
        if dies {
            state.processes.remove(&pid);
        }
        Ok(SignalDelivery::Delivered)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.contains(pid)
    }
}
