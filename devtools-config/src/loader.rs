//! Configuration loader implementations.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::schema::{ServerConfig, keys};

/// Errors raised while resolving configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A property was present but could not be parsed.
    #[error("invalid value `{value}` for `{key}` (from {source_name}): {reason}")]
    InvalidValue {
        /// Property key.
        key: String,
        /// Raw value.
        value: String,
        /// Source that supplied it.
        source_name: String,
        /// Parser message.
        reason: String,
    },
}

/// Read-only key/value view over some configuration origin.
pub trait PropertySource: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Returns the raw value of `key`, if set.
    fn property(&self, key: &str) -> Option<String>;
}

/// Process environment, mapping `devtools.mcp.port` to `DEVTOOLS_MCP_PORT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    /// Creates an environment-backed source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the environment variable name for a property key.
    #[must_use]
    pub fn variable_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvSource {
    fn name(&self) -> &str {
        "environment variables"
    }

    fn property(&self, key: &str) -> Option<String> {
        std::env::var(Self::variable_name(key)).ok()
    }
}

/// In-memory source, mostly for tests and embedded defaults.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    values: BTreeMap<String, String>,
}

impl MapSource {
    /// Creates an empty named source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn property(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Resolves [`ServerConfig`] from ordered sources; the first source that
/// defines a key wins.
#[derive(Default)]
pub struct ConfigLoader<'a> {
    sources: Vec<&'a dyn PropertySource>,
}

impl fmt::Debug for ConfigLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<'a> ConfigLoader<'a> {
    /// Creates a loader without sources; it yields the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source with lower precedence than those already added.
    #[must_use]
    pub fn with_source(mut self, source: &'a dyn PropertySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Resolves the configuration on top of [`ServerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a defined key fails to parse.
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::default();

        if let Some(port) = self.parsed::<u16>(keys::PORT)? {
            config.port = port;
        }
        if let Some(address) = self.parsed::<IpAddr>(keys::BIND_ADDRESS)? {
            config.bind_address = address;
        }
        if let Some(limit) = self.parsed::<usize>(keys::MAX_SESSIONS)? {
            if limit == 0 {
                return Err(self.invalid(keys::MAX_SESSIONS, "0", "must be at least 1"));
            }
            config.max_sessions = limit;
        }
        if let Some((name, _)) = self.lookup(keys::SERVER_NAME) {
            config.server_name = name;
        }

        debug!(?config, "server configuration resolved");
        Ok(config)
    }

    fn lookup(&self, key: &str) -> Option<(String, &str)> {
        self.sources.iter().find_map(|source| {
            source
                .property(key)
                .map(|value| (value.trim().to_owned(), source.name()))
        })
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some((raw, source_name)) = self.lookup(key) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidValue {
                key: key.to_owned(),
                value: raw.clone(),
                source_name: source_name.to_owned(),
                reason: err.to_string(),
            })
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        let source_name = self
            .lookup(key)
            .map_or_else(|| "unknown".to_owned(), |(_, name)| name.to_owned());
        ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            source_name,
            reason: reason.to_owned(),
        }
    }
}
