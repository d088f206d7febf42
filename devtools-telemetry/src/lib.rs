//! Observability utilities for the devtools MCP server.

#![warn(missing_docs, clippy::pedantic)]

pub mod health;
pub mod tracing_support;

pub use health::{HealthSnapshot, MemoryUsage, ProcessStats};
pub use tracing_support::{TelemetryError, init, try_init};
