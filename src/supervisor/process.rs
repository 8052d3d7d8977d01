// src/supervisor/process.rs

use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

use super::drain::spawn_log_drainer;
use super::{Liveness, LogBuffer, Outcome, Ownership, Phase, ServerDescriptor};
use crate::config::SupervisorSettings;
use crate::errors::Result;
use crate::host::{HostSignal, ProcessHost, SignalDelivery};

/// How long an early-exiting child's output may take to reach the buffer.
const DRAIN_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Poll interval while waiting for a signalled process to disappear.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wait after SIGKILL for the kernel to tear the process down.
const KILL_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

/// A child spawned by this supervisor.
#[derive(Debug)]
struct OwnedChild {
    child: Child,
    pid: u32,
    drainer: JoinHandle<()>,
}

/// What this supervisor knows about "its" process.
#[derive(Debug, Default)]
enum ProcessSlot {
    #[default]
    Vacant,
    Owned(OwnedChild),
    /// Found by scan; we hold no handle, only the pid.
    Adopted(u32),
}

/// Supervises one server: start, stop, restart, status and captured logs.
///
/// Lifecycle operations on one supervisor are serialized: two concurrent
/// `start()` calls cannot spawn two children. Log reads and [`state`] never
/// wait for an in-flight operation.
///
/// [`state`]: Supervisor::state
pub struct Supervisor {
    descriptor: Arc<ServerDescriptor>,
    settings: SupervisorSettings,
    host: Arc<dyn ProcessHost>,
    slot: tokio::sync::Mutex<ProcessSlot>,
    phase: Mutex<Phase>,
    logs: LogBuffer,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("server", &self.descriptor.key)
            .field("port", &self.descriptor.port)
            .field("phase", &self.state())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        descriptor: ServerDescriptor,
        settings: SupervisorSettings,
        host: Arc<dyn ProcessHost>,
    ) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            logs: LogBuffer::new(settings.log_capacity),
            settings,
            host,
            slot: tokio::sync::Mutex::new(ProcessSlot::Vacant),
            phase: Mutex::new(Phase::Stopped),
        }
    }

    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Shared handle to the captured log.
    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Last `count` log entries, oldest first.
    pub fn recent_logs(&self, count: usize) -> Vec<String> {
        self.logs.recent(count)
    }

    /// Last known phase; see [`Phase`] for why this may lag reality.
    pub fn state(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconcile bookkeeping with the OS and report whether the server runs.
    ///
    /// Checked in order: our own child, a runtime process listening on the
    /// port, a process whose command line mentions the entry point. A scan
    /// failure clears the port and reports [`Liveness::NotRunning`].
    pub async fn is_running(&self) -> Liveness {
        let mut slot = self.slot.lock().await;
        self.probe(&mut slot).await
    }

    /// Launch the server unless something is already serving it.
    pub async fn start(&self) -> Outcome {
        let mut slot = self.slot.lock().await;
        self.start_locked(&mut slot).await
    }

    /// Stop the server, escalating from our handle to pid to port.
    pub async fn stop(&self) -> Outcome {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// `stop`, pause, `start`. A failed stop does not abort the restart.
    pub async fn restart(&self) -> Outcome {
        let mut slot = self.slot.lock().await;
        let stopped = self.stop_locked(&mut slot).await;
        if !stopped.success {
            warn!(
                server = %self.descriptor.key,
                message = %stopped.message,
                "stop before restart failed; starting anyway"
            );
        }
        sleep(self.settings.restart_pause).await;
        self.start_locked(&mut slot).await
    }

    /// Snapshot for display.
    pub async fn status(&self) -> StatusReport {
        let liveness = self.is_running().await;
        StatusReport {
            descriptor: Arc::clone(&self.descriptor),
            liveness,
            phase: self.state(),
            last_log: self.logs.last(),
        }
    }

    async fn probe(&self, slot: &mut ProcessSlot) -> Liveness {
        if let ProcessSlot::Owned(owned) = slot {
            match owned.child.try_wait() {
                Ok(None) => {
                    self.set_phase(Phase::Running(Ownership::Owned));
                    return Liveness::Owned { pid: owned.pid };
                }
                Ok(Some(status)) => {
                    self.note_warn(format!("Server process {} exited ({status})", owned.pid));
                }
                Err(e) => {
                    self.note_warn(format!(
                        "Lost track of server process {}: {e}",
                        owned.pid
                    ));
                }
            }
            *slot = ProcessSlot::Vacant;
        }

        match self.detect_foreign() {
            Ok(Some(liveness)) => {
                if let Some(pid) = liveness.pid() {
                    *slot = ProcessSlot::Adopted(pid);
                }
                self.set_phase(Phase::Running(Ownership::Adopted));
                liveness
            }
            Ok(None) => {
                *slot = ProcessSlot::Vacant;
                self.set_phase(Phase::Stopped);
                Liveness::NotRunning
            }
            Err(e) => {
                error!(server = %self.descriptor.key, error = %e, "liveness scan failed");
                self.logs
                    .push(format!("Error checking if server is running: {e}"));
                self.kill_port().await;
                *slot = ProcessSlot::Vacant;
                self.set_phase(Phase::Stopped);
                Liveness::NotRunning
            }
        }
    }

    /// Steps 2 and 3 of liveness detection. Both require the process name to
    /// contain the expected runtime name. Heuristic: another service with the
    /// same entry-point file name is indistinguishable from ours.
    fn detect_foreign(&self) -> Result<Option<Liveness>> {
        let d = &self.descriptor;
        let runtime = d.process_name.to_lowercase();

        for listener in self.host.listeners_on(d.port)? {
            if listener.name.to_lowercase().contains(&runtime) {
                return Ok(Some(Liveness::ListeningOnPort { pid: listener.pid }));
            }
            debug!(
                server = %d.key,
                pid = listener.pid,
                name = %listener.name,
                port = d.port,
                "port held by a process that is not the expected runtime"
            );
        }

        // Editors and log tailers mention the entry point too; only the
        // runtime counts.
        let by_cmdline = self.host.find_by_cmdline(&d.entry_point)?;
        Ok(by_cmdline
            .iter()
            .find(|p| p.name.to_lowercase().contains(&runtime))
            .map(|p| Liveness::MatchedCommandLine { pid: p.pid }))
    }

    async fn start_locked(&self, slot: &mut ProcessSlot) -> Outcome {
        if self.probe(slot).await.is_running() {
            self.note("Server is already running");
            return Outcome::ok("Server is already running");
        }

        self.set_phase(Phase::Starting);
        let mark = self.logs.mark();

        let mut child = match self.spawn_child() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Error starting server: {e}");
                self.note_warn(&message);
                self.set_phase(Phase::Stopped);
                return Outcome::failed(message);
            }
        };

        let pid = child.id().unwrap_or_default();
        info!(
            server = %self.descriptor.key,
            pid,
            cmd = %self.descriptor.command_line(),
            dir = %self.descriptor.working_dir.display(),
            "spawned server process"
        );

        let drainer = spawn_log_drainer(
            self.descriptor.key.clone(),
            child.stdout.take(),
            child.stderr.take(),
            self.logs.clone(),
        );

        // Give immediate failures (port conflict, missing module) time to show.
        sleep(self.settings.grace_period).await;

        match child.try_wait() {
            Ok(None) => {
                *slot = ProcessSlot::Owned(OwnedChild {
                    child,
                    pid,
                    drainer,
                });
                self.set_phase(Phase::Running(Ownership::Owned));
                self.note(format!("Server started on port {}", self.descriptor.port));
                Outcome::ok("Server started successfully")
            }
            Ok(Some(status)) => {
                // Let the drainer flush what the child printed before dying.
                if timeout(DRAIN_FLUSH_TIMEOUT, drainer).await.is_err() {
                    debug!(server = %self.descriptor.key, "drainer still busy after early exit");
                }
                let (entries, _) = self.logs.since(mark);
                let output: Vec<String> = entries.into_iter().map(|e| e.message).collect();
                let detail = if output.is_empty() {
                    format!("process exited with {status}")
                } else {
                    output.join("\n")
                };

                let message = format!("Failed to start server: {detail}");
                self.note_warn(&message);
                self.set_phase(Phase::Stopped);
                Outcome::failed(message)
            }
            Err(e) => {
                let message = format!("Error starting server: {e}");
                self.note_warn(&message);
                self.set_phase(Phase::Stopped);
                Outcome::failed(message)
            }
        }
    }

    fn spawn_child(&self) -> std::io::Result<Child> {
        let d = &self.descriptor;
        let mut cmd = Command::new(&d.program);
        cmd.arg(&d.entry_point)
            .current_dir(&d.working_dir)
            .envs(&d.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Children outlive the supervisor and get re-adopted by scan.
            .kill_on_drop(false);
        cmd.spawn()
    }

    async fn stop_locked(&self, slot: &mut ProcessSlot) -> Outcome {
        let liveness = self.probe(slot).await;
        let owned = matches!(slot, ProcessSlot::Owned(_));

        if !liveness.is_running() && !owned {
            self.note("Server is not running");
            return Outcome::ok("Server is not running");
        }

        self.set_phase(Phase::Stopping);
        let mut stopped: Option<String> = None;
        let mut failure = String::new();

        if let ProcessSlot::Owned(child) = std::mem::take(slot) {
            match self.terminate_owned(child).await {
                Ok(message) => stopped = Some(message),
                Err(message) => failure = message,
            }
        }

        if let (None, Some(pid)) = (&stopped, liveness.pid()) {
            match self.terminate_pid(pid).await {
                Ok(message) => stopped = Some(message),
                Err(message) => failure = message,
            }
        }

        if stopped.is_none() {
            self.kill_port().await;
            if !self.probe(slot).await.is_running() {
                stopped = Some("Server force stopped (port cleared)".to_string());
            }
        }

        match stopped {
            Some(message) => {
                *slot = ProcessSlot::Vacant;
                self.set_phase(Phase::Stopped);
                self.note(&message);
                Outcome::ok(message)
            }
            None => {
                if failure.is_empty() {
                    failure = "server is still running after all stop attempts".to_string();
                }
                self.note_warn(format!("Failed to stop server: {failure}"));
                // The final probe already recorded whatever is still running.
                Outcome::failed(failure)
            }
        }
    }

    /// SIGTERM our child, wait, SIGKILL if it does not exit in time.
    async fn terminate_owned(&self, mut owned: OwnedChild) -> std::result::Result<String, String> {
        let result = self.signal_owned(&mut owned).await;
        // Pick up the child's last words; a grandchild may still hold the pipes.
        if timeout(DRAIN_FLUSH_TIMEOUT, owned.drainer).await.is_err() {
            debug!(server = %self.descriptor.key, pid = owned.pid, "output pipes still open after exit");
        }
        result
    }

    async fn signal_owned(&self, owned: &mut OwnedChild) -> std::result::Result<String, String> {
        let pid = owned.pid;
        let term = self.host.signal(pid, HostSignal::Terminate);

        match term {
            Ok(_) => {
                if let Ok(waited) = timeout(self.settings.stop_timeout, owned.child.wait()).await {
                    return match waited {
                        Ok(status) => {
                            debug!(server = %self.descriptor.key, pid, %status, "server exited");
                            Ok("Server stopped successfully".to_string())
                        }
                        Err(e) => Err(format!("Error stopping process: {e}")),
                    };
                }
                warn!(
                    server = %self.descriptor.key,
                    pid,
                    timeout = ?self.settings.stop_timeout,
                    "server ignored SIGTERM; killing"
                );
            }
            Err(e) => {
                warn!(server = %self.descriptor.key, pid, error = %e, "SIGTERM failed; killing");
            }
        }

        match owned.child.kill().await {
            Ok(()) => Ok("Server force stopped".to_string()),
            Err(e) => Err(format!("Error terminating process: {e}")),
        }
    }

    /// SIGTERM a pid we do not own, escalating to SIGKILL after the timeout.
    async fn terminate_pid(&self, pid: u32) -> std::result::Result<String, String> {
        match self.host.signal(pid, HostSignal::Terminate) {
            Ok(SignalDelivery::NoSuchProcess) => Ok("Server was not running".to_string()),
            Ok(SignalDelivery::Delivered) => {
                if self.wait_for_exit(pid, self.settings.stop_timeout).await {
                    return Ok("Server stopped successfully (via PID)".to_string());
                }
                match self.host.signal(pid, HostSignal::Kill) {
                    Ok(_) => {
                        self.wait_for_exit(pid, KILL_SETTLE_TIMEOUT).await;
                        Ok("Server force stopped (via PID)".to_string())
                    }
                    Err(e) => Err(format!("Error killing process {pid}: {e}")),
                }
            }
            Err(e) => Err(format!("Error killing process {pid}: {e}")),
        }
    }

    /// Terminate whatever listens on the configured port.
    async fn kill_port(&self) {
        let port = self.descriptor.port;
        let listeners = match self.host.listeners_on(port) {
            Ok(listeners) => listeners,
            Err(e) => {
                self.note_warn(format!("Error killing process on port {port}: {e}"));
                return;
            }
        };

        let own_pid = std::process::id();
        for listener in listeners.into_iter().filter(|l| l.pid != own_pid) {
            let pid = listener.pid;
            match self.host.signal(pid, HostSignal::Terminate) {
                Ok(SignalDelivery::NoSuchProcess) => continue,
                Ok(SignalDelivery::Delivered) => {
                    if self.wait_for_exit(pid, self.settings.port_release_timeout).await {
                        info!(server = %self.descriptor.key, pid, port, "cleared port");
                        continue;
                    }
                    if let Err(e) = self.host.signal(pid, HostSignal::Kill) {
                        self.note_warn(format!("Error killing process {pid} on port {port}: {e}"));
                    }
                }
                Err(e) => {
                    self.note_warn(format!("Error killing process {pid} on port {port}: {e}"));
                }
            }
        }
    }

    /// Poll until `pid` is gone; `true` if it went away within `limit`.
    async fn wait_for_exit(&self, pid: u32, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if !self.host.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn note(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(server = %self.descriptor.key, "{message}");
        self.logs.push(message);
    }

    fn note_warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(server = %self.descriptor.key, "{message}");
        self.logs.push(message);
    }
}

/// Everything a front end shows about one server.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub descriptor: Arc<ServerDescriptor>,
    pub liveness: Liveness,
    pub phase: Phase,
    pub last_log: Option<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.descriptor;
        writeln!(f, "{} [{}]: {}", d.name, d.key, self.liveness)?;
        writeln!(f, "  port:      {}", d.port)?;
        writeln!(f, "  url:       {}", d.url())?;
        writeln!(f, "  directory: {}", d.working_dir.display())?;
        writeln!(f, "  command:   {}", d.command_line())?;
        match &self.last_log {
            Some(line) => write!(f, "  last log:  {line}"),
            None => write!(f, "  last log:  (none)"),
        }
    }
}
