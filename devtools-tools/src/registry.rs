//! Tool definitions, descriptor extraction, and the immutable registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::CallContext;
use crate::schema::{ParamSpec, ParameterSchema};

const MAX_NAME_LEN: usize = 64;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Validated call arguments, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    /// Wraps an argument map.
    #[must_use]
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the raw value supplied for a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    /// Returns a string argument.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Deserializes the arguments into a typed input structure.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] when the arguments do not match
    /// the shape of `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ToolResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|err| {
            ToolError::InvalidArguments {
                reason: err.to_string(),
            }
        })
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Executes the tool with validated arguments.
    async fn call(&self, args: Arguments, ctx: CallContext) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(Arguments, CallContext) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn call(&self, args: Arguments, ctx: CallContext) -> ToolResult<Value> {
        (self)(args, ctx).await
    }
}

/// Adapter that deserializes arguments into `I` and serializes the `O` output.
struct Typed<F, I, O> {
    func: F,
    _marker: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<F, Fut, I, O> ToolHandler for Typed<F, I, O>
where
    F: Send + Sync + Fn(I, CallContext) -> Fut,
    Fut: Future<Output = ToolResult<O>> + Send,
    I: DeserializeOwned + Send,
    O: Serialize,
{
    async fn call(&self, args: Arguments, ctx: CallContext) -> ToolResult<Value> {
        let input: I = args.deserialize()?;
        let output = (self.func)(input, ctx).await?;
        serde_json::to_value(output).map_err(|err| ToolError::execution(err.to_string()))
    }
}

/// Adapter running a synchronous function on the blocking thread pool.
struct Blocking<F> {
    func: Arc<F>,
}

#[async_trait]
impl<F> ToolHandler for Blocking<F>
where
    F: Fn(Arguments, CallContext) -> ToolResult<Value> + Send + Sync + 'static,
{
    async fn call(&self, args: Arguments, ctx: CallContext) -> ToolResult<Value> {
        let func = Arc::clone(&self.func);
        match tokio::task::spawn_blocking(move || func(args, ctx)).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(ToolError::execution(panic_message(
                err.into_panic().as_ref(),
            ))),
            Err(err) => Err(ToolError::execution(err.to_string())),
        }
    }
}

/// Declarative registration entry: one row of a provider group's tool table.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: ParameterSchema,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// Defines a tool backed by an async handler over raw [`Arguments`].
    pub fn new<H>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<ParameterSchema>,
        handler: H,
    ) -> Self
    where
        H: ToolHandler + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters.into(),
            handler: Arc::new(handler),
        }
    }

    /// Defines a tool whose handler takes a deserialized input struct.
    pub fn typed<F, Fut, I, O>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<ParameterSchema>,
        func: F,
    ) -> Self
    where
        F: Send + Sync + Fn(I, CallContext) -> Fut + 'static,
        Fut: Future<Output = ToolResult<O>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
    {
        Self::new(
            name,
            description,
            parameters,
            Typed {
                func,
                _marker: PhantomData,
            },
        )
    }

    /// Defines a tool whose synchronous handler may block.
    pub fn blocking<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: impl Into<ParameterSchema>,
        func: F,
    ) -> Self
    where
        F: Fn(Arguments, CallContext) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self::new(
            name,
            description,
            parameters,
            Blocking {
                func: Arc::new(func),
            },
        )
    }

    /// Returns the declared tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the definition and freezes it into a descriptor owned by `group`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if the name is empty, too long or
    /// contains unsupported characters, the description is blank, or a parameter
    /// name is blank or declared twice.
    pub fn extract(self, group: &str) -> ToolResult<ToolDescriptor> {
        validate_name(&self.name)?;

        if self.description.trim().is_empty() {
            return Err(ToolError::invalid_definition(
                &self.name,
                "description cannot be empty",
            ));
        }

        if self
            .parameters
            .params()
            .iter()
            .any(|spec| spec.name().trim().is_empty())
        {
            return Err(ToolError::invalid_definition(
                &self.name,
                "parameter names cannot be empty",
            ));
        }

        if let Some(duplicate) = self.parameters.duplicate_name() {
            return Err(ToolError::invalid_definition(
                &self.name,
                format!("parameter `{duplicate}` is declared more than once"),
            ));
        }

        Ok(ToolDescriptor {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            group: group.to_owned(),
            handler: self.handler,
        })
    }
}

fn validate_name(name: &str) -> ToolResult<()> {
    if name.is_empty() {
        return Err(ToolError::invalid_definition(name, "tool name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ToolError::invalid_definition(
            name,
            format!("tool name length must be <= {MAX_NAME_LEN}"),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ToolError::invalid_definition(
            name,
            "tool name must contain alphanumeric, dash, underscore, or dot",
        ));
    }
    Ok(())
}

/// Immutable description of a registered tool plus its handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: ParameterSchema,
    group: String,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Returns the unique tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    /// Returns the provider group that contributed this tool.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the handler bound to this tool.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }

    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.params().to_vec(),
            input_schema: self.parameters.input_schema(),
        }
    }
}

/// Public listing entry advertised to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Ordered parameter list.
    pub parameters: Vec<ParamSpec>,
    /// JSON Schema rendering of the parameters.
    pub input_schema: Value,
}

/// Read-only table of active tools, shared by every session.
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    listing: Vec<ToolInfo>,
    active_groups: Vec<String>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names().collect::<Vec<_>>())
            .field("active_groups", &self.active_groups)
            .finish()
    }
}

impl ToolRegistry {
    /// Builds the registry from descriptors whose names are already unique.
    pub(crate) fn from_parts(tools: Vec<ToolDescriptor>, active_groups: Vec<String>) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(idx, tool)| (tool.name.clone(), idx))
            .collect();
        let listing = tools.iter().map(ToolDescriptor::info).collect();
        Self {
            tools,
            index,
            listing,
            active_groups,
        }
    }

    /// Returns an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    /// Returns `true` when the tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the listing computed at assembly time, in registration order.
    #[must_use]
    pub fn listing(&self) -> &[ToolInfo] {
        &self.listing
    }

    /// Iterates over the registered tool names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(ToolDescriptor::name)
    }

    /// Returns the names of the provider groups that were activated.
    #[must_use]
    pub fn active_groups(&self) -> &[String] {
        &self.active_groups
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Errors produced by tool definitions and handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Tool definition failed validation.
    #[error("invalid tool definition `{name}`: {reason}")]
    InvalidDefinition {
        /// Name of the offending tool.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Handler rejected its input after schema validation passed. Callers
    /// see it as an execution failure.
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// Human-readable reason.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    fn invalid_definition(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_owned()
    }
}
