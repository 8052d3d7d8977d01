// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::supervisor::ServerDescriptor;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [supervisor]
/// log_capacity = 100
/// grace_period = "2s"
///
/// [runtime]
/// program = "node"
///
/// [server.email]
/// name = "Email Server"
/// dir = "server_projects/gmail_smtp_app_password"
/// entry = "server.js"
/// port = 3001
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one `[server.<key>]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Timing and buffer settings from `[supervisor]`.
    #[serde(default)]
    pub supervisor: SupervisorSection,

    /// Launcher defaults shared by every server, from `[runtime]`.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// All servers from `[server.<key>]`, keyed by registry key.
    #[serde(default)]
    pub server: BTreeMap<String, ServerConfig>,
}

/// `[supervisor]` section.
///
/// Durations are kept as strings here (`"2s"`, `"500ms"`) and parsed during
/// validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// Maximum number of log lines kept per server.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// How long `start` waits before declaring the child alive.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// How long `stop` waits after SIGTERM before sending SIGKILL.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,

    /// Pause between the stop and start halves of a restart.
    #[serde(default = "default_restart_pause")]
    pub restart_pause: String,

    /// How long port clearing waits for a listener to exit before SIGKILL.
    #[serde(default = "default_port_release_timeout")]
    pub port_release_timeout: String,
}

fn default_log_capacity() -> usize {
    100
}

fn default_grace_period() -> String {
    "2s".to_string()
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

fn default_restart_pause() -> String {
    "1s".to_string()
}

fn default_port_release_timeout() -> String {
    "3s".to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            grace_period: default_grace_period(),
            stop_timeout: default_stop_timeout(),
            restart_pause: default_restart_pause(),
            port_release_timeout: default_port_release_timeout(),
        }
    }
}

/// `[runtime]` section: how server entry points are launched.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Launcher executable; the child command is `program <entry>`.
    #[serde(default = "default_program")]
    pub program: String,

    /// Executable name expected on an adopted listener.
    ///
    /// If `None`, the file name of `program` is used.
    #[serde(default)]
    pub process_name: Option<String>,

    /// Environment variable that carries the port to the child.
    #[serde(default = "default_port_env")]
    pub port_env: String,

    /// Extra environment applied to every server.
    #[serde(default = "default_runtime_env")]
    pub env: BTreeMap<String, String>,
}

fn default_program() -> String {
    "node".to_string()
}

fn default_port_env() -> String {
    "PORT".to_string()
}

fn default_runtime_env() -> BTreeMap<String, String> {
    BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())])
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            process_name: None,
            port_env: default_port_env(),
            env: default_runtime_env(),
        }
    }
}

/// `[server.<key>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Display name; defaults to the key.
    #[serde(default)]
    pub name: Option<String>,

    /// Working directory. Relative paths are resolved against the directory
    /// of the config file by the loader.
    pub dir: PathBuf,

    /// Entry point passed to the launcher.
    pub entry: String,

    /// Port the server is expected to bind.
    pub port: u16,

    /// Per-server override of `runtime.program`.
    #[serde(default)]
    pub program: Option<String>,

    /// Per-server override of `runtime.process_name`.
    #[serde(default)]
    pub process_name: Option<String>,

    /// Extra environment, layered over `runtime.env`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Parsed `[supervisor]` values used by every supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub log_capacity: usize,
    pub grace_period: Duration,
    pub stop_timeout: Duration,
    pub restart_pause: Duration,
    pub port_release_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            grace_period: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
            restart_pause: Duration::from_secs(1),
            port_release_timeout: Duration::from_secs(3),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see
/// [`validate`](crate::config::validate)), so every descriptor in here has a
/// non-zero, unique port and a non-empty entry point.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: SupervisorSettings,
    pub servers: BTreeMap<String, ServerDescriptor>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        settings: SupervisorSettings,
        servers: BTreeMap<String, ServerDescriptor>,
    ) -> Self {
        Self { settings, servers }
    }
}
