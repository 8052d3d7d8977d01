// src/host/unsupported.rs

//! Fallback for platforms without `/proc`.
//!
//! Every scan fails, which the supervisor treats as "not running"; owned
//! children can still be started and stopped through their handles.

use super::{HostSignal, ProcessHost, ProcessInfo, SignalDelivery, SystemHost};
use crate::errors::{PortvisorError, Result};

impl ProcessHost for SystemHost {
    fn listeners_on(&self, _port: u16) -> Result<Vec<ProcessInfo>> {
        Err(unsupported())
    }

    fn find_by_cmdline(&self, _needle: &str) -> Result<Vec<ProcessInfo>> {
        Err(unsupported())
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: HostSignal) -> Result<SignalDelivery> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => {
                return Err(PortvisorError::SignalError {
                    pid,
                    message: "not a valid process id".to_string(),
                });
            }
        };
        let sig = match signal {
            HostSignal::Terminate => Signal::SIGTERM,
            HostSignal::Kill => Signal::SIGKILL,
        };
        match kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(SignalDelivery::Delivered),
            Err(Errno::ESRCH) => Ok(SignalDelivery::NoSuchProcess),
            Err(e) => Err(PortvisorError::SignalError {
                pid,
                message: e.to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, _signal: HostSignal) -> Result<SignalDelivery> {
        Err(PortvisorError::SignalError {
            pid,
            message: "signals are not supported on this platform".to_string(),
        })
    }

    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match i32::try_from(pid) {
            Ok(raw) if raw > 0 => kill(Pid::from_raw(raw), None).is_ok(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }
}

fn unsupported() -> PortvisorError {
    PortvisorError::ScanError(
        "port and process-table scans need /proc (Linux only)".to_string(),
    )
}
