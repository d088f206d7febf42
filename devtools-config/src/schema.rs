//! Strongly typed configuration schema.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Port used when no source overrides `devtools.mcp.port`.
pub const DEFAULT_PORT: u16 = 9999;

/// Fixed HTTP path at which the transport is reachable.
pub const DEFAULT_PATH: &str = "/mcp";

const DEFAULT_MAX_SESSIONS: usize = 32;

/// Property keys understood by the loader.
pub mod keys {
    /// Listening port.
    pub const PORT: &str = "devtools.mcp.port";
    /// Listening interface.
    pub const BIND_ADDRESS: &str = "devtools.mcp.bind-address";
    /// Upper bound on sessions open at once.
    pub const MAX_SESSIONS: &str = "devtools.mcp.max-sessions";
    /// Server name reported during negotiation.
    pub const SERVER_NAME: &str = "devtools.mcp.server-name";
}

/// Listener and identity settings for the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_address: IpAddr,
    /// Port to bind. `0` requests an ephemeral port.
    pub port: u16,
    /// HTTP path of the WebSocket endpoint.
    pub path: String,
    /// Name reported to callers.
    pub server_name: String,
    /// Version reported to callers.
    pub server_version: String,
    /// Sessions served at once; further upgrades get `503`.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_owned(),
            server_name: "Devtools MCP Server".to_owned(),
            server_version: env!("CARGO_PKG_VERSION").to_owned(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Overrides the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the session limit.
    #[must_use]
    pub fn with_max_sessions(mut self, limit: usize) -> Self {
        self.max_sessions = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9999);
        assert_eq!(config.path, "/mcp");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9999");
        assert_eq!(config.max_sessions, 32);
    }
}
