// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Lifecycle operations on a supervisor never surface these: they report an
//! [`Outcome`](crate::supervisor::Outcome) instead. Everything around them
//! (config loading, registry lookups, host scans) uses [`PortvisorError`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortvisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown server '{name}' (known: {known})")]
    UnknownServer { name: String, known: String },

    #[error("Host scan failed: {0}")]
    ScanError(String),

    #[error("Failed to signal pid {pid}: {message}")]
    SignalError { pid: u32, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PortvisorError>;
