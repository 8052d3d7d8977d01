// src/config/validate.rs

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile, SupervisorSection, SupervisorSettings};
use crate::errors::{PortvisorError, Result};
use crate::supervisor::ServerDescriptor;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PortvisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let settings = parse_settings(&raw.supervisor)?;
        let servers = build_descriptors(&raw);
        Ok(ConfigFile::new_unchecked(settings, servers))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_servers(cfg)?;
    validate_runtime(cfg)?;
    validate_servers(cfg)?;
    validate_unique_ports(cfg)?;
    Ok(())
}

fn ensure_has_servers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.is_empty() {
        return Err(config_error(
            "config must contain at least one [server.<key>] section",
        ));
    }
    Ok(())
}

fn validate_runtime(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runtime.program.trim().is_empty() {
        return Err(config_error("[runtime].program must not be empty"));
    }
    if cfg.runtime.port_env.trim().is_empty() {
        return Err(config_error("[runtime].port_env must not be empty"));
    }
    Ok(())
}

fn validate_servers(cfg: &RawConfigFile) -> Result<()> {
    for (key, server) in cfg.server.iter() {
        if key.trim().is_empty() {
            return Err(config_error("server keys must not be empty"));
        }
        if server.port == 0 {
            return Err(config_error(format!(
                "server '{key}' must have a non-zero port"
            )));
        }
        if server.entry.trim().is_empty() {
            return Err(config_error(format!(
                "server '{key}' has an empty entry point"
            )));
        }
        if let Some(name) = &server.name
            && name.trim().is_empty()
        {
            return Err(config_error(format!("server '{key}' has an empty name")));
        }
        if let Some(program) = &server.program
            && program.trim().is_empty()
        {
            return Err(config_error(format!(
                "server '{key}' overrides program with an empty string"
            )));
        }
    }
    Ok(())
}

fn validate_unique_ports(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashMap<u16, &str> = HashMap::new();
    for (key, server) in cfg.server.iter() {
        if let Some(other) = seen.insert(server.port, key.as_str()) {
            return Err(config_error(format!(
                "servers '{other}' and '{key}' both use port {}",
                server.port
            )));
        }
    }
    Ok(())
}

fn parse_settings(section: &SupervisorSection) -> Result<SupervisorSettings> {
    if section.log_capacity == 0 {
        return Err(config_error(
            "[supervisor].log_capacity must be >= 1 (got 0)",
        ));
    }

    let field = |name: &str, value: &str| {
        parse_duration(value)
            .map_err(|e| config_error(format!("[supervisor].{name}: {e}")))
    };

    Ok(SupervisorSettings {
        log_capacity: section.log_capacity,
        grace_period: field("grace_period", &section.grace_period)?,
        stop_timeout: field("stop_timeout", &section.stop_timeout)?,
        restart_pause: field("restart_pause", &section.restart_pause)?,
        port_release_timeout: field("port_release_timeout", &section.port_release_timeout)?,
    })
}

fn build_descriptors(cfg: &RawConfigFile) -> BTreeMap<String, ServerDescriptor> {
    let runtime = &cfg.runtime;

    cfg.server
        .iter()
        .map(|(key, server)| {
            let program = server
                .program
                .clone()
                .unwrap_or_else(|| runtime.program.clone());

            let process_name = server
                .process_name
                .clone()
                .or_else(|| runtime.process_name.clone())
                .unwrap_or_else(|| executable_name(&program));

            let mut env = runtime.env.clone();
            env.extend(server.env.clone());
            env.insert(runtime.port_env.clone(), server.port.to_string());

            let descriptor = ServerDescriptor {
                key: key.clone(),
                name: server.name.clone().unwrap_or_else(|| key.clone()),
                working_dir: server.dir.clone(),
                entry_point: server.entry.clone(),
                port: server.port,
                program,
                process_name,
                env,
            };
            (key.clone(), descriptor)
        })
        .collect()
}

/// `"/usr/bin/node"` -> `"node"`; bare names pass through.
fn executable_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

fn config_error(message: impl Into<String>) -> PortvisorError {
    PortvisorError::ConfigError(message.into())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::config::model::ServerConfig;

    fn server(port: u16) -> ServerConfig {
        ServerConfig {
            name: None,
            dir: PathBuf::from("/srv/app"),
            entry: "server.js".to_string(),
            port,
            program: None,
            process_name: None,
            env: BTreeMap::new(),
        }
    }

    fn raw_with(servers: Vec<(&str, ServerConfig)>) -> RawConfigFile {
        RawConfigFile {
            server: servers
                .into_iter()
                .map(|(k, s)| (k.to_string(), s))
                .collect(),
            ..RawConfigFile::default()
        }
    }

    #[test]
    fn descriptor_inherits_runtime_defaults() {
        let cfg = ConfigFile::try_from(raw_with(vec![("email", server(3001))])).unwrap();
        let d = &cfg.servers["email"];

        assert_eq!(d.name, "email");
        assert_eq!(d.program, "node");
        assert_eq!(d.process_name, "node");
        assert_eq!(d.env.get("PORT").map(String::as_str), Some("3001"));
        assert_eq!(d.env.get("NODE_ENV").map(String::as_str), Some("production"));
        assert_eq!(cfg.settings, SupervisorSettings::default());
    }

    #[test]
    fn process_name_defaults_to_program_file_name() {
        let mut s = server(3001);
        s.program = Some("/opt/node/bin/node20".to_string());
        let cfg = ConfigFile::try_from(raw_with(vec![("a", s)])).unwrap();
        assert_eq!(cfg.servers["a"].process_name, "node20");
    }

    #[test]
    fn server_env_overrides_runtime_env_but_not_port() {
        let mut s = server(3001);
        s.env.insert("NODE_ENV".to_string(), "development".to_string());
        s.env.insert("PORT".to_string(), "1".to_string());
        let cfg = ConfigFile::try_from(raw_with(vec![("a", s)])).unwrap();

        let env = &cfg.servers["a"].env;
        assert_eq!(env["NODE_ENV"], "development");
        assert_eq!(env["PORT"], "3001");
    }

    #[test]
    fn rejects_empty_server_table() {
        let err = ConfigFile::try_from(RawConfigFile::default()).unwrap_err();
        assert!(matches!(err, PortvisorError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn rejects_zero_port_and_empty_entry() {
        let err = ConfigFile::try_from(raw_with(vec![("a", server(0))])).unwrap_err();
        assert!(err.to_string().contains("non-zero port"));

        let mut s = server(3001);
        s.entry = "  ".to_string();
        let err = ConfigFile::try_from(raw_with(vec![("a", s)])).unwrap_err();
        assert!(err.to_string().contains("empty entry point"));
    }

    #[test]
    fn rejects_duplicate_ports() {
        let err =
            ConfigFile::try_from(raw_with(vec![("a", server(3001)), ("b", server(3001))]))
                .unwrap_err();
        assert!(err.to_string().contains("both use port 3001"));
    }

    #[test]
    fn rejects_zero_capacity_and_bad_durations() {
        let mut raw = raw_with(vec![("a", server(3001))]);
        raw.supervisor.log_capacity = 0;
        assert!(ConfigFile::try_from(raw).is_err());

        let mut raw = raw_with(vec![("a", server(3001))]);
        raw.supervisor.grace_period = "soon".to_string();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("grace_period"));
    }

    #[test]
    fn parses_custom_durations() {
        let mut raw = raw_with(vec![("a", server(3001))]);
        raw.supervisor.grace_period = "300ms".to_string();
        raw.supervisor.stop_timeout = "1s".to_string();
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.settings.grace_period, Duration::from_millis(300));
        assert_eq!(cfg.settings.stop_timeout, Duration::from_secs(1));
    }
}
