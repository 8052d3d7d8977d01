// src/registry.rs

//! Name → supervisor lookup.
//!
//! Built once from a validated [`ConfigFile`] and passed to whoever needs it
//! (CLI, console, tests). There is no global instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{PortvisorError, Result};
use crate::host::ProcessHost;
use crate::supervisor::Supervisor;

#[derive(Debug, Default)]
pub struct Registry {
    supervisors: BTreeMap<String, Arc<Supervisor>>,
}

impl Registry {
    /// One supervisor per configured server, all sharing `host`.
    pub fn from_config(cfg: &ConfigFile, host: Arc<dyn ProcessHost>) -> Self {
        let supervisors = cfg
            .servers
            .iter()
            .map(|(key, descriptor)| {
                debug!(server = %key, port = descriptor.port, "registering supervisor");
                let supervisor =
                    Supervisor::new(descriptor.clone(), cfg.settings, Arc::clone(&host));
                (key.clone(), Arc::new(supervisor))
            })
            .collect();

        Self { supervisors }
    }

    /// Look up a supervisor by key; unknown keys list the known ones.
    pub fn get(&self, key: &str) -> Result<Arc<Supervisor>> {
        self.supervisors
            .get(key)
            .cloned()
            .ok_or_else(|| PortvisorError::UnknownServer {
                name: key.to_string(),
                known: self.keys().collect::<Vec<_>>().join(", "),
            })
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.supervisors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Supervisor>)> {
        self.supervisors.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }
}
