//! Lifecycle tests against real child processes (`sh` scripts).
#![cfg(target_os = "linux")]

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use portvisor::config::ConfigFile;
use portvisor::host::{ProcessHost, SystemHost};
use portvisor::supervisor::{Liveness, Ownership, Phase, Supervisor};
use portvisor_test_utils::builders::{ConfigFileBuilder, ServerConfigBuilder};
use portvisor_test_utils::scripts::{self, ScriptDir};
use portvisor_test_utils::{free_port, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn from_config(cfg: ConfigFile, key: &str) -> Supervisor {
    let descriptor = cfg.servers[key].clone();
    Supervisor::new(descriptor, cfg.settings, Arc::new(SystemHost))
}

fn sh_supervisor(dir: &ScriptDir, tag: &str, body: &str) -> Supervisor {
    let entry = dir.script(tag, body);
    let cfg = ConfigFileBuilder::fast()
        .program("sh")
        .with_server(
            "svc",
            ServerConfigBuilder::new(&entry, free_port())
                .name("Script Server")
                .dir(dir.path())
                .build(),
        )
        .build();
    from_config(cfg, "svc")
}

#[tokio::test]
async fn start_is_idempotent() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "idempotent", scripts::LONG_LIVED);

    let first = with_timeout(sup.start()).await;
    assert!(first.success, "{first}");
    assert_eq!(first.message, "Server started successfully");

    let Liveness::Owned { pid } = sup.is_running().await else {
        panic!("expected an owned child");
    };

    let second = with_timeout(sup.start()).await;
    assert!(second.success);
    assert_eq!(second.message, "Server is already running");
    assert_eq!(sup.is_running().await, Liveness::Owned { pid });

    assert!(with_timeout(sup.stop()).await.success);
    Ok(())
}

#[tokio::test]
async fn stop_terminates_owned_child() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "stop", scripts::LONG_LIVED);

    assert!(with_timeout(sup.start()).await.success);
    let pid = sup.is_running().await.pid().ok_or("no pid after start")?;
    assert_eq!(sup.state(), Phase::Running(Ownership::Owned));

    let started = Instant::now();
    let stopped = with_timeout(sup.stop()).await;
    assert!(stopped.success, "{stopped}");
    assert_eq!(stopped.message, "Server stopped successfully");
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(sup.is_running().await, Liveness::NotRunning);
    assert_eq!(sup.state(), Phase::Stopped);
    assert!(!SystemHost.is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn child_output_and_port_env_reach_the_log() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "output", scripts::LONG_LIVED);
    let port = sup.descriptor().port;

    assert!(with_timeout(sup.start()).await.success);
    let logs = sup.recent_logs(20);
    assert!(
        logs.iter().any(|l| l.ends_with(&format!("server ready on {port}"))),
        "logs: {logs:?}"
    );
    assert!(logs.iter().any(|l| l.ends_with(&format!("Server started on port {port}"))));

    with_timeout(sup.stop()).await;
    Ok(())
}

#[tokio::test]
async fn restart_spawns_a_new_child() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "restart", scripts::LONG_LIVED);

    assert!(with_timeout(sup.start()).await.success);
    let before = sup.is_running().await.pid().ok_or("no pid after start")?;

    let restarted = with_timeout(sup.restart()).await;
    assert!(restarted.success, "{restarted}");

    let after = sup.is_running().await;
    assert!(matches!(after, Liveness::Owned { .. }));
    assert_ne!(after.pid(), Some(before));
    assert!(!SystemHost.is_alive(before));

    with_timeout(sup.stop()).await;
    Ok(())
}

#[tokio::test]
async fn early_exit_reports_child_output() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "early-exit", scripts::EARLY_EXIT);

    let outcome = with_timeout(sup.start()).await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Failed to start server: "), "{outcome}");
    assert!(outcome.message.contains("EADDRINUSE"), "{outcome}");

    assert_eq!(sup.state(), Phase::Stopped);
    assert!(!sup.is_running().await.is_running());

    // Still usable afterwards.
    assert_eq!(sup.stop().await.message, "Server is not running");
    Ok(())
}

#[tokio::test]
async fn missing_entry_point_fails_within_grace_period() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .grace_period("2s")
        .with_server(
            "test",
            ServerConfigBuilder::new("nonexistent.js", 9999)
                .name("Test")
                .dir(".")
                .build(),
        )
        .build();
    let sup = from_config(cfg, "test");

    let started = Instant::now();
    let outcome = with_timeout(sup.start()).await;
    assert!(!outcome.success);
    assert!(!outcome.message.is_empty());
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!sup.is_running().await.is_running());
    Ok(())
}

#[tokio::test]
async fn spawn_failure_keeps_supervisor_usable() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let cfg = ConfigFileBuilder::fast()
        .program("portvisor-no-such-runtime")
        .with_server(
            "ghost",
            ServerConfigBuilder::new(&dir.script("ghost", scripts::LONG_LIVED), free_port())
                .dir(dir.path())
                .build(),
        )
        .build();
    let sup = from_config(cfg, "ghost");

    let outcome = with_timeout(sup.start()).await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Error starting server: "), "{outcome}");
    assert_eq!(sup.state(), Phase::Stopped);
    Ok(())
}

#[tokio::test]
async fn term_ignoring_child_is_force_stopped() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "stubborn", scripts::IGNORES_TERM);

    assert!(with_timeout(sup.start()).await.success);
    let pid = sup.is_running().await.pid().ok_or("no pid after start")?;

    let stopped = with_timeout(sup.stop()).await;
    assert!(stopped.success, "{stopped}");
    assert_eq!(stopped.message, "Server force stopped");
    assert!(!SystemHost.is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn exit_is_detected_lazily() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let sup = sh_supervisor(&dir, "lazy", scripts::SHORT_LIVED);

    assert!(with_timeout(sup.start()).await.success);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // Nobody asked yet, so the recorded phase is stale.
    assert_eq!(sup.state(), Phase::Running(Ownership::Owned));

    assert_eq!(sup.is_running().await, Liveness::NotRunning);
    assert_eq!(sup.state(), Phase::Stopped);
    assert!(sup.recent_logs(10).iter().any(|l| l.contains("exited")));
    Ok(())
}

#[tokio::test]
async fn process_started_elsewhere_is_adopted_by_command_line() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new();
    let entry = dir.script("foreign", scripts::LONG_LIVED);
    let cfg = ConfigFileBuilder::fast()
        .program("sh")
        .with_server(
            "svc",
            ServerConfigBuilder::new(&entry, free_port())
                .dir(dir.path())
                .build(),
        )
        .build();
    let sup = from_config(cfg, "svc");

    let mut foreign = std::process::Command::new("sh")
        .arg(&entry)
        .current_dir(dir.path())
        .stdout(std::process::Stdio::null())
        .spawn()?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let liveness = sup.is_running().await;
    assert_eq!(liveness, Liveness::MatchedCommandLine { pid: foreign.id() });
    assert_eq!(sup.state(), Phase::Running(Ownership::Adopted));

    // Already running: start must not spawn a second copy.
    assert_eq!(with_timeout(sup.start()).await.message, "Server is already running");

    let stopped = with_timeout(sup.stop()).await;
    assert!(stopped.success, "{stopped}");
    assert_eq!(stopped.message, "Server stopped successfully (via PID)");

    let status = foreign.wait()?;
    assert!(!status.success());
    Ok(())
}
