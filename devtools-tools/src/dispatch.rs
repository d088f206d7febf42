//! Invocation dispatcher: lookup, validation, execution, normalization.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::registry::{Arguments, ToolError, ToolRegistry, panic_message};
use crate::schema::{ArgumentError, json_type};

/// Caller-visible error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No tool with the requested name is registered.
    UnknownTool,
    /// Arguments did not satisfy the tool's schema.
    InvalidArguments,
    /// The handler failed.
    ExecutionFailed,
    /// A message arrived in a session state that does not accept it.
    ProtocolViolation,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArguments => "InvalidArguments",
            Self::ExecutionFailed => "ExecutionFailed",
            Self::ProtocolViolation => "ProtocolViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named call with its raw arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Tool to invoke.
    pub name: String,
    /// Arguments keyed by parameter name. `null` is treated as `{}`.
    #[serde(default)]
    pub arguments: Value,
}

impl InvocationRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Terminal outcome of a call. Exactly one is produced per request.
#[derive(Clone, Debug, PartialEq)]
pub enum InvocationResponse {
    /// The handler returned a value, passed through unmodified.
    Success(Value),
    /// The call failed.
    Failure {
        /// Category the caller can branch on.
        kind: ErrorKind,
        /// Human-readable detail. Never empty.
        message: String,
    },
}

impl InvocationResponse {
    /// Builds a failure response, substituting a generic message for an empty one.
    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = format!("{kind} (no further detail)");
        }
        Self::Failure { kind, message }
    }

    /// Returns `true` for successful calls.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the error kind of a failed call.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Executes named calls against the registry with per-call failure isolation.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry backing this dispatcher.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invokes a tool. Never fails: every problem becomes a failure response.
    ///
    /// Unknown argument keys are ignored. [`ErrorKind::InvalidArguments`] is
    /// only reported before the handler runs; whatever the handler returns
    /// or panics with is [`ErrorKind::ExecutionFailed`].
    pub async fn invoke(&self, request: InvocationRequest, ctx: CallContext) -> InvocationResponse {
        let InvocationRequest { name, arguments } = request;

        let Some(descriptor) = self.registry.get(&name) else {
            debug!(tool = %name, "unknown tool requested");
            return InvocationResponse::failure(
                ErrorKind::UnknownTool,
                format!("tool `{name}` is not registered"),
            );
        };

        let arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                let err = ArgumentError::NotAnObject {
                    found: json_type(&other),
                };
                debug!(tool = %name, error = %err, "rejecting call with invalid arguments");
                return InvocationResponse::failure(ErrorKind::InvalidArguments, err.to_string());
            }
        };

        if let Err(err) = descriptor.parameters().validate(&arguments) {
            debug!(tool = %name, error = %err, "rejecting call with invalid arguments");
            return InvocationResponse::failure(ErrorKind::InvalidArguments, err.to_string());
        }

        let handler = descriptor.handler();
        let call = handler.call(Arguments::new(arguments), ctx);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => InvocationResponse::Success(value),
            Ok(Err(err)) => {
                warn!(tool = %name, error = %err, "tool execution failed");
                InvocationResponse::failure(ErrorKind::ExecutionFailed, failure_reason(err))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = %name, %message, "tool handler panicked");
                InvocationResponse::failure(ErrorKind::ExecutionFailed, message)
            }
        }
    }
}

fn failure_reason(err: ToolError) -> String {
    match err {
        ToolError::Execution { reason } | ToolError::InvalidArguments { reason } => reason,
        ToolError::InvalidDefinition { .. } => err.to_string(),
    }
}
