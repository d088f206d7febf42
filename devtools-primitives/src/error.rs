//! Shared error definitions for primitive types.

use thiserror::Error;

/// Result alias used throughout the server.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// A string is not a session identifier issued by this server.
    #[error("invalid session id `{value}`: {reason}")]
    InvalidSessionId {
        /// The rejected text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Capability identifier failed validation.
    #[error("invalid capability id `{id}`: {reason}")]
    InvalidCapabilityId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
