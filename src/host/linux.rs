// src/host/linux.rs

use std::collections::HashSet;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use procfs::net::TcpState;
use procfs::process::{FDTarget, Process, all_processes};

use super::{HostSignal, ProcessHost, ProcessInfo, SignalDelivery, SystemHost};
use crate::errors::{PortvisorError, Result};

impl ProcessHost for SystemHost {
    fn listeners_on(&self, port: u16) -> Result<Vec<ProcessInfo>> {
        let inodes = listening_inodes(port)?;
        if inodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut owners = Vec::new();
        for process in all_processes().map_err(scan_error)?.flatten() {
            // Other users' fd tables are unreadable without privileges.
            let Ok(fds) = process.fd() else { continue };
            let holds_socket = fds.flatten().any(|fd| {
                matches!(fd.target, FDTarget::Socket(inode) if inodes.contains(&inode))
            });
            if holds_socket {
                owners.push(process_info(&process));
            }
        }
        Ok(owners)
    }

    fn find_by_cmdline(&self, needle: &str) -> Result<Vec<ProcessInfo>> {
        let own_pid = std::process::id();
        let mut matches = Vec::new();

        for process in all_processes().map_err(scan_error)?.flatten() {
            if u32::try_from(process.pid()).ok() == Some(own_pid) {
                continue;
            }
            // Kernel threads and zombies have an empty command line.
            let Ok(cmdline) = process.cmdline() else { continue };
            if cmdline.is_empty() {
                continue;
            }
            if cmdline.join(" ").contains(needle) {
                matches.push(process_info(&process));
            }
        }
        Ok(matches)
    }

    fn signal(&self, pid: u32, signal: HostSignal) -> Result<SignalDelivery> {
        let raw = checked_pid(pid)?;
        let sig = match signal {
            HostSignal::Terminate => Signal::SIGTERM,
            HostSignal::Kill => Signal::SIGKILL,
        };

        match kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(SignalDelivery::Delivered),
            Err(Errno::ESRCH) => Ok(SignalDelivery::NoSuchProcess),
            Err(e) => Err(PortvisorError::SignalError {
                pid,
                message: format!("kill({pid}, {sig:?}) failed: {e}"),
            }),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Ok(raw) = checked_pid(pid) else {
            return false;
        };
        match Process::new(raw).and_then(|p| p.stat()) {
            Ok(stat) => stat.state != 'Z',
            Err(_) => false,
        }
    }
}

/// Socket inodes in LISTEN state bound to `port`, over IPv4 and IPv6.
fn listening_inodes(port: u16) -> Result<HashSet<u64>> {
    let mut entries = procfs::net::tcp().map_err(scan_error)?;
    // tcp6 is missing on hosts with IPv6 disabled.
    if let Ok(v6) = procfs::net::tcp6() {
        entries.extend(v6);
    }

    Ok(entries
        .into_iter()
        .filter(|e| matches!(e.state, TcpState::Listen) && e.local_address.port() == port)
        .map(|e| e.inode)
        .collect())
}

fn process_info(process: &Process) -> ProcessInfo {
    let name = process.stat().map(|s| s.comm).unwrap_or_default();
    ProcessInfo {
        pid: u32::try_from(process.pid()).unwrap_or_default(),
        name,
    }
}

/// Refuse pids that `kill(2)` would interpret as process groups.
fn checked_pid(pid: u32) -> Result<i32> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(PortvisorError::SignalError {
            pid,
            message: "not a valid process id".to_string(),
        }),
    }
}

fn scan_error(err: procfs::ProcError) -> PortvisorError {
    PortvisorError::ScanError(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn finds_own_listener_by_port() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let owners = SystemHost.listeners_on(port).unwrap();
        let own_pid = std::process::id();
        assert!(
            owners.iter().any(|p| p.pid == own_pid),
            "expected pid {own_pid} among listeners on {port}: {owners:?}"
        );
    }

    #[test]
    fn unbound_port_has_no_listeners() {
        let port = {
            let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(SystemHost.listeners_on(port).unwrap().is_empty());
    }

    #[test]
    fn cmdline_scan_skips_self() {
        let exe = std::env::args().next().unwrap_or_default();
        let found = SystemHost.find_by_cmdline(&exe).unwrap();
        assert!(found.iter().all(|p| p.pid != std::process::id()));
    }

    #[test]
    fn liveness_and_signals_for_missing_pid() {
        assert!(SystemHost.is_alive(std::process::id()));
        assert!(!SystemHost.is_alive(0));
        assert!(SystemHost.signal(0, HostSignal::Terminate).is_err());
    }
}
