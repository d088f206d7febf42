//! Core shared types for the devtools MCP server.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod error;
mod ids;

/// Capability identifiers and the detected capability set.
pub use capability::{CapabilityId, CapabilitySet};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier assigned to every accepted session.
pub use ids::SessionId;
