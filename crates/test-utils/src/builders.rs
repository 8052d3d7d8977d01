#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use portvisor::config::{ConfigFile, RawConfigFile, ServerConfig};
use portvisor::supervisor::ServerDescriptor;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Short timings so lifecycle tests finish quickly.
    pub fn fast() -> Self {
        Self::new()
            .grace_period("300ms")
            .stop_timeout("2s")
            .restart_pause("100ms")
            .port_release_timeout("1s")
    }

    pub fn with_server(mut self, key: &str, server: ServerConfig) -> Self {
        self.config.server.insert(key.to_string(), server);
        self
    }

    pub fn program(mut self, program: &str) -> Self {
        self.config.runtime.program = program.to_string();
        self
    }

    pub fn process_name(mut self, name: &str) -> Self {
        self.config.runtime.process_name = Some(name.to_string());
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.config.supervisor.log_capacity = capacity;
        self
    }

    pub fn grace_period(mut self, value: &str) -> Self {
        self.config.supervisor.grace_period = value.to_string();
        self
    }

    pub fn stop_timeout(mut self, value: &str) -> Self {
        self.config.supervisor.stop_timeout = value.to_string();
        self
    }

    pub fn restart_pause(mut self, value: &str) -> Self {
        self.config.supervisor.restart_pause = value.to_string();
        self
    }

    pub fn port_release_timeout(mut self, value: &str) -> Self {
        self.config.supervisor.port_release_timeout = value.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Build and pull out the descriptor for `key`.
    pub fn descriptor(self, key: &str) -> ServerDescriptor {
        self.build()
            .servers
            .remove(key)
            .unwrap_or_else(|| panic!("no server '{key}' in builder"))
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ServerConfig`.
pub struct ServerConfigBuilder {
    server: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new(entry: &str, port: u16) -> Self {
        Self {
            server: ServerConfig {
                name: None,
                dir: PathBuf::from("."),
                entry: entry.to_string(),
                port,
                program: None,
                process_name: None,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.server.name = Some(name.to_string());
        self
    }

    pub fn dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.server.dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn program(mut self, program: &str) -> Self {
        self.server.program = Some(program.to_string());
        self
    }

    pub fn process_name(mut self, name: &str) -> Self {
        self.server.process_name = Some(name.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.server.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ServerConfig {
        self.server
    }
}
