// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] holds the raw `serde` mapping of `Portvisor.toml` and the
//!   validated [`ConfigFile`].
//! - [`validate`] turns a [`RawConfigFile`] into a [`ConfigFile`].
//! - [`loader`] reads files and resolves relative server directories.
//! - [`defaults`] provides the built-in server table used when no file exists.

pub mod defaults;
pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::builtin_config;
pub use loader::{load_and_validate, load_from_path, resolve_config};
pub use model::{
    ConfigFile, RawConfigFile, RuntimeSection, ServerConfig, SupervisorSection,
    SupervisorSettings,
};
