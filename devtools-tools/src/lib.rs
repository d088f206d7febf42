//! Tool discovery, registry assembly, and invocation dispatch.
//!
//! Provider groups declare their tools through explicit registration tables
//! ([`registry::ToolDefinition`]). At startup the [`detect::CapabilityDetector`]
//! probes the host, [`assembly::RegistryAssembly`] evaluates each group's
//! activation predicate against the detected capabilities, and the surviving
//! tools are frozen into an immutable [`registry::ToolRegistry`]. Calls are
//! executed through the [`dispatch::Dispatcher`], which converts every failure
//! into an [`dispatch::InvocationResponse`] instead of propagating it.

#![warn(missing_docs, clippy::pedantic)]

pub mod assembly;
pub mod collaborator;
pub mod context;
pub mod detect;
pub mod dispatch;
pub mod provider;
pub mod registry;
pub mod schema;

pub use assembly::{AssemblyError, RegistryAssembly};
pub use collaborator::CollectorError;
pub use context::{CallContext, LogLevel, Notification, Notifier};
pub use detect::{CapabilityDetector, CapabilityProbe, FnProbe, ProbeError};
pub use dispatch::{Dispatcher, ErrorKind, InvocationRequest, InvocationResponse};
pub use provider::{ActivationPredicate, ProviderGroup};
pub use registry::{
    Arguments, ToolDefinition, ToolDescriptor, ToolError, ToolHandler, ToolInfo, ToolRegistry,
    ToolResult, panic_message,
};
pub use schema::{ArgumentError, ParamSpec, ParamType, ParameterSchema};
