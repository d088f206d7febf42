//! Wire-level structures for the JSON-RPC 2.0 dialect spoken over the
//! WebSocket transport. One message travels per text frame.

use std::collections::BTreeSet;
use std::fmt;

use devtools_tools::{ErrorKind, InvocationResponse, Notification, ToolInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revisions this server can speak, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Revision offered when the caller asks for one we do not know.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by the server.
pub mod error_codes {
    /// Frame was not valid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// JSON was not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method is not known.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Parameters did not match the method.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Message arrived in a session state that does not accept it.
    pub const PROTOCOL_VIOLATION: i64 = -32002;
}

/// Request identifier chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl RequestId {
    /// Reads an id from a decoded envelope. Only strings and integers that
    /// fit an `i64` qualify.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Number),
            Value::String(text) => Some(Self::String(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Methods understood by the session handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `notifications/initialized`
    Initialized,
    /// `tools/list`
    ListTools,
    /// `tools/call`
    CallTool,
    /// `logging/setLevel`
    SetLogLevel,
    /// `ping`
    Ping,
    /// `shutdown`
    Shutdown,
    /// Anything else.
    Other(String),
}

impl Method {
    /// Maps a wire method name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "initialize" => Self::Initialize,
            "notifications/initialized" => Self::Initialized,
            "tools/list" => Self::ListTools,
            "tools/call" => Self::CallTool,
            "logging/setLevel" => Self::SetLogLevel,
            "ping" => Self::Ping,
            "shutdown" => Self::Shutdown,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
            Self::SetLogLevel => "logging/setLevel",
            Self::Ping => "ping",
            Self::Shutdown => "shutdown",
            Self::Other(name) => name,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A request expecting exactly one response.
    Request {
        /// Caller-chosen id echoed in the response.
        id: RequestId,
        /// Requested method.
        method: Method,
        /// Raw parameters, `null` when omitted.
        params: Value,
    },
    /// A fire-and-forget notification.
    Notification {
        /// Notified method.
        method: Method,
        /// Raw parameters, `null` when omitted.
        params: Value,
    },
    /// A response sent by the caller; the server issues no requests, so these
    /// are ignored.
    Reply {
        /// Echoed id, if any.
        id: Option<RequestId>,
    },
}

/// Frames that cannot be decoded into [`Incoming`].
#[derive(Debug, Error)]
pub enum WireError {
    /// Not JSON, or not an object of the expected shape.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Valid JSON that is not a JSON-RPC 2.0 message.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Id of the offending message, when one could be read.
        id: Option<RequestId>,
        /// What was wrong.
        reason: &'static str,
    },
}

impl WireError {
    /// Converts the failure into the error response sent back to the caller.
    #[must_use]
    pub fn into_response(self) -> Outgoing {
        match self {
            Self::Parse(err) => Outgoing::error(None, RpcError::parse_error(err.to_string())),
            Self::InvalidRequest { id, reason } => {
                Outgoing::error(id, RpcError::new(error_codes::INVALID_REQUEST, reason))
            }
        }
    }
}

/// Decodes a text frame.
///
/// # Errors
///
/// Returns [`WireError`] for malformed JSON or non-2.0 messages.
pub fn decode(text: &str) -> Result<Incoming, WireError> {
    let Value::Object(mut envelope) = serde_json::from_str::<Value>(text)? else {
        return Err(WireError::InvalidRequest {
            id: None,
            reason: "message must be a JSON object",
        });
    };

    let id = match envelope.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(RequestId::from_value(&raw).ok_or(WireError::InvalidRequest {
            id: None,
            reason: "id must be a string or an integer",
        })?),
    };

    if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(WireError::InvalidRequest {
            id,
            reason: "jsonrpc must be \"2.0\"",
        });
    }

    let method = match envelope.remove("method") {
        None => return Ok(Incoming::Reply { id }),
        Some(Value::String(method)) => Method::parse(&method),
        Some(_) => {
            return Err(WireError::InvalidRequest {
                id,
                reason: "method must be a string",
            });
        }
    };
    let params = envelope.remove("params").unwrap_or(Value::Null);

    Ok(match id {
        Some(id) => Incoming::Request { id, method, params },
        None => Incoming::Notification { method, params },
    })
}

/// Error object of a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric code, see [`error_codes`].
    pub code: i64,
    /// Human readable message.
    pub message: String,
    /// Structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error without data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Malformed JSON.
    #[must_use]
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, detail)
    }

    /// Unknown method.
    #[must_use]
    pub fn method_not_found(method: &Method) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("method `{}` not found", method.as_str()),
        )
    }

    /// Parameters that could not be decoded for the method.
    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, detail)
            .with_kind(ErrorKind::InvalidArguments)
    }

    /// Message not accepted in the current session state.
    #[must_use]
    pub fn protocol_violation(detail: impl Into<String>) -> Self {
        Self::new(error_codes::PROTOCOL_VIOLATION, detail)
            .with_kind(ErrorKind::ProtocolViolation)
    }

    fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.data = Some(json!({ "errorKind": kind.as_str() }));
        self
    }

    /// Returns the `errorKind` carried in `data`, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<&str> {
        self.data.as_ref()?.get("errorKind")?.as_str()
    }
}

/// A frame the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Successful response to a request.
    Response {
        /// Echoed request id.
        id: RequestId,
        /// Method result.
        result: Value,
    },
    /// Error response. `id` is `None` when the request id could not be read.
    Error {
        /// Echoed request id.
        id: Option<RequestId>,
        /// Error detail.
        error: RpcError,
    },
    /// Server-initiated notification.
    Notification {
        /// Method name.
        method: String,
        /// Parameters.
        params: Value,
    },
}

impl Outgoing {
    /// Builds a success response.
    #[must_use]
    pub fn response(id: RequestId, result: Value) -> Self {
        Self::Response { id, result }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self::Error { id, error }
    }

    /// Wraps a handler notification as `notifications/message`.
    #[must_use]
    pub fn message(notification: &Notification) -> Self {
        Self::Notification {
            method: "notifications/message".to_owned(),
            params: json!({
                "level": notification.level,
                "logger": notification.logger,
                "data": notification.data,
            }),
        }
    }

    /// Server-initiated `shutdown` notice sent before the server closes a session.
    #[must_use]
    pub fn shutdown_notice(reason: &str) -> Self {
        Self::Notification {
            method: Method::Shutdown.as_str().to_owned(),
            params: json!({ "reason": reason }),
        }
    }

    /// Renders the JSON value of the frame.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Response { id, result } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": result,
            }),
            Self::Error { id, error } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": error,
            }),
            Self::Notification { method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }),
        }
    }

    /// Renders the text frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }
}

/// Optional protocol features a session can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolFeature {
    /// `tools/list`.
    ToolListing,
    /// `tools/call`.
    ToolInvocation,
    /// Notifications emitted during calls, and `logging/setLevel`.
    Notifications,
}

impl ProtocolFeature {
    /// All features, in wire order.
    pub const ALL: [Self; 3] = [Self::ToolListing, Self::ToolInvocation, Self::Notifications];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolListing => "tools.list",
            Self::ToolInvocation => "tools.call",
            Self::Notifications => "notifications",
        }
    }

    /// Maps a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.as_str() == name)
    }
}

/// Set of negotiated features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet(BTreeSet<ProtocolFeature>);

impl FeatureSet {
    /// Every feature the server implements.
    #[must_use]
    pub fn all() -> Self {
        Self(ProtocolFeature::ALL.into_iter().collect())
    }

    /// Returns `true` if `feature` is in the set.
    #[must_use]
    pub fn contains(&self, feature: ProtocolFeature) -> bool {
        self.0.contains(&feature)
    }

    /// Returns the features present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Returns the wire names, in wire order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|feature| feature.as_str()).collect()
    }
}

impl FromIterator<ProtocolFeature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = ProtocolFeature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Caller identity sent with `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Caller name.
    #[serde(default)]
    pub name: String,
    /// Caller version.
    #[serde(default)]
    pub version: String,
}

/// Parameters of `initialize`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Requested protocol revision.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Caller identity.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
    /// Features the caller supports.
    #[serde(default)]
    pub capabilities: Option<Value>,
}

impl InitializeParams {
    /// Features the caller is willing to use.
    ///
    /// An array of feature names is taken literally; unknown names are
    /// ignored. A missing field or an object (the form in which MCP clients
    /// describe their own client-side capabilities) accepts every feature.
    #[must_use]
    pub fn requested_features(&self) -> FeatureSet {
        match &self.capabilities {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(ProtocolFeature::from_name)
                .collect(),
            _ => FeatureSet::all(),
        }
    }

    /// Picks the protocol revision to speak.
    #[must_use]
    pub fn negotiated_version(&self) -> &'static str {
        self.protocol_version
            .as_deref()
            .and_then(|requested| {
                SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .copied()
                    .find(|supported| *supported == requested)
            })
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
    }
}

/// Server identity reported in the `initialize` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Result of `initialize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Agreed protocol revision.
    pub protocol_version: &'static str,
    /// Server identity.
    pub server_info: ServerInfo,
    /// Negotiated features by wire name.
    pub capabilities: Vec<&'static str>,
}

/// Result of `tools/list`.
#[derive(Debug, Serialize)]
pub struct ListToolsResult<'a> {
    /// Active tools in registration order.
    pub tools: &'a [ToolInfo],
}

/// Parameters of `logging/setLevel`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetLevelParams {
    /// Lowest severity forwarded to the caller, by its syslog name.
    pub level: String,
}

/// Renders the result of `tools/call`.
///
/// The outcome is carried both as `ok`/`value`/`errorKind`/`message` and as
/// the MCP `content`/`isError` pair.
#[must_use]
pub fn call_result(response: &InvocationResponse) -> Value {
    match response {
        InvocationResponse::Success(value) => json!({
            "ok": true,
            "value": value,
            "content": [{ "type": "text", "text": render_text(value) }],
            "isError": false,
        }),
        InvocationResponse::Failure { kind, message } => json!({
            "ok": false,
            "errorKind": kind.as_str(),
            "message": message,
            "content": [{ "type": "text", "text": message }],
            "isError": true,
        }),
    }
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
