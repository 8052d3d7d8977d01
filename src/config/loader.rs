// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::defaults::builtin_config;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "PORTVISOR_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation or path resolution. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path, resolve server directories and run
/// validation.
///
/// Relative `dir` entries are joined onto the directory that contains the
/// config file, so a config can be moved together with its server projects.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    resolve_server_dirs(&mut raw_config, &config_root_dir(path));
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Pick the configuration to run with.
///
/// Order:
/// 1. an explicit path (from `--config`),
/// 2. `PORTVISOR_CONFIG`,
/// 3. `Portvisor.toml` in the current directory, if present,
/// 4. the built-in three-server table rooted at the current directory.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading config");
        return load_and_validate(path);
    }

    if let Ok(from_env) = std::env::var(CONFIG_ENV_VAR)
        && !from_env.trim().is_empty()
    {
        info!(path = %from_env, "loading config from {CONFIG_ENV_VAR}");
        return load_and_validate(from_env);
    }

    let default_path = default_config_path();
    if default_path.is_file() {
        info!(path = %default_path.display(), "loading config");
        return load_and_validate(default_path);
    }

    let cwd = current_dir();
    debug!(root = %cwd.display(), "no config file found; using built-in servers");
    builtin_config(&cwd)
}

/// Default config file name, looked up in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Portvisor.toml")
}

/// Join every relative server `dir` onto `root`.
pub(crate) fn resolve_server_dirs(raw: &mut RawConfigFile, root: &Path) {
    for server in raw.server.values_mut() {
        if server.dir.is_relative() {
            server.dir = root.join(&server.dir);
        }
    }
}

/// Figure out the directory relative server paths hang off.
///
/// - If the config path has a non-empty parent (e.g. "deploy/Portvisor.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Portvisor.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => current_dir(),
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
