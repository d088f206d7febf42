//! Session lifecycle and protocol serving for the devtools MCP server.
//!
//! This crate owns everything between the socket and the invocation
//! dispatcher: the per-session state machine, the JSON-RPC wire types, a
//! bounded worker pool for tool calls, and the listener with its stop handle.

#![warn(missing_docs, clippy::pedantic)]

mod lifecycle;
mod protocol;
mod scheduler;
mod server;
mod session;
mod transport;
pub mod wire;

pub use lifecycle::{Lifecycle, LifecycleError, LifecycleResult, SessionEvent, SessionState};
pub use protocol::{Action, SessionProtocol};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
pub use server::{McpServer, ServerError, ServerHandle, ServerResult};
pub use wire::{FeatureSet, Outgoing, ProtocolFeature, RequestId, RpcError, ServerInfo};
