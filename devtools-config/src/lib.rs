//! Configuration management for the devtools MCP server.
//!
//! [`ServerConfig`] carries the listener settings. [`ConfigLoader`] resolves
//! them from an ordered list of [`PropertySource`]s, typically the process
//! environment followed by the host application's own properties.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader, EnvSource, MapSource, PropertySource};
pub use schema::{DEFAULT_PATH, DEFAULT_PORT, ServerConfig, keys};
