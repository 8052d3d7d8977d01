// src/config/defaults.rs

//! Built-in server table.
//!
//! Three Node.js servers living under `server_projects/`, each on its own
//! port. Used when neither `--config`, `PORTVISOR_CONFIG` nor a
//! `Portvisor.toml` in the working directory is available.

use std::path::{Path, PathBuf};

use crate::config::loader::resolve_server_dirs;
use crate::config::model::{ConfigFile, RawConfigFile, ServerConfig};
use crate::errors::Result;

const BUILTIN_SERVERS: [(&str, &str, &str, u16); 3] = [
    ("email", "Email Server", "server_projects/gmail_smtp_app_password", 3001),
    ("mailpicname", "MailPicName", "server_projects/mailpicname", 3002),
    ("videoemail", "Video Email", "server_projects/video-email-app", 3003),
];

const BUILTIN_ENTRY: &str = "server.js";

/// Raw form of the built-in table, with directories still relative.
pub fn builtin_raw_config() -> RawConfigFile {
    let server = BUILTIN_SERVERS
        .iter()
        .map(|(key, name, dir, port)| {
            let cfg = ServerConfig {
                name: Some((*name).to_string()),
                dir: PathBuf::from(dir),
                entry: BUILTIN_ENTRY.to_string(),
                port: *port,
                program: None,
                process_name: None,
                env: Default::default(),
            };
            ((*key).to_string(), cfg)
        })
        .collect();

    RawConfigFile {
        server,
        ..RawConfigFile::default()
    }
}

/// Validated built-in table with directories resolved against `root`.
pub fn builtin_config(root: &Path) -> Result<ConfigFile> {
    let mut raw = builtin_raw_config();
    resolve_server_dirs(&mut raw, root);
    ConfigFile::try_from(raw)
}
