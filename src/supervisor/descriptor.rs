// src/supervisor/descriptor.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Static description of one supervised server.
///
/// Built from `[server.<key>]` during config validation; never changes
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Registry key, e.g. `"email"`.
    pub key: String,
    /// Display name, e.g. `"Email Server"`.
    pub name: String,
    /// Directory the child runs in.
    pub working_dir: PathBuf,
    /// Script handed to `program`, e.g. `"server.js"`.
    pub entry_point: String,
    /// Port the child is expected to bind.
    pub port: u16,
    /// Launcher executable.
    pub program: String,
    /// Executable name expected on an adopted listener.
    pub process_name: String,
    /// Full child environment overlay, port variable included.
    pub env: BTreeMap<String, String>,
}

impl ServerDescriptor {
    /// Address to open the server's web interface.
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// `program entry` as it would be typed in a shell.
    pub fn command_line(&self) -> String {
        format!("{} {}", self.program, self.entry_point)
    }
}
