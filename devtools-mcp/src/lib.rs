//! Devtools MCP server facade.
//!
//! Bundles the workspace crates behind feature flags. A host process builds
//! a [`tools::ToolRegistry`] (usually through [`host::HostContext`]), pairs it
//! with a [`config::ServerConfig`] and calls [`kernel::McpServer::start`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use devtools_mcp::config::ServerConfig;
//! use devtools_mcp::host::HostContext;
//! use devtools_mcp::kernel::McpServer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Arc::new(HostContext::new());
//! let registry = host.registry(Vec::new())?;
//! let handle = McpServer::new(ServerConfig::default(), registry).start().await?;
//! println!("listening on {}", handle.url());
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use devtools_primitives as primitives;

/// Tool definitions, provider groups, assembly and dispatch.
pub use devtools_tools as tools;

/// Session lifecycle, protocol and listener (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use devtools_kernel as kernel;

/// Server configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use devtools_config as config;

/// Tracing setup and health snapshots (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use devtools_telemetry as telemetry;

/// Host introspection and the standard tool groups (enabled by `host` feature).
#[cfg(feature = "host")]
pub use devtools_host as host;
