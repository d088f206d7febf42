//! Per-session protocol handling.
//!
//! [`SessionProtocol`] owns one session's lifecycle, negotiated features and
//! notification level. It turns each decoded frame into an [`Action`] for the
//! driver; it never performs I/O itself, which keeps every protocol decision
//! testable without a socket.

use std::sync::Arc;

use devtools_primitives::SessionId;
use devtools_tools::{
    InvocationRequest, InvocationResponse, LogLevel, Notification, Notifier, ToolRegistry,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::lifecycle::{Lifecycle, SessionEvent, SessionState};
use crate::wire::{
    self, FeatureSet, Incoming, InitializeParams, InitializeResult, ListToolsResult, Method,
    Outgoing, ProtocolFeature, RequestId, RpcError, ServerInfo, SetLevelParams,
};

/// What the driver must do after a frame has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Nothing to send.
    None,
    /// Send a frame and keep reading.
    Reply(Outgoing),
    /// Run a tool call, then answer `id` with [`SessionProtocol::complete_call`].
    Invoke {
        /// Request to answer once the call finishes.
        id: RequestId,
        /// Call to run.
        request: InvocationRequest,
    },
    /// Send a frame, then close the transport.
    Close(Outgoing),
}

/// Protocol state of a single caller session.
#[derive(Debug)]
pub struct SessionProtocol {
    lifecycle: Lifecycle,
    server: Arc<ServerInfo>,
    registry: Arc<ToolRegistry>,
    offered: FeatureSet,
    negotiated: FeatureSet,
    log_level: LogLevel,
}

impl SessionProtocol {
    /// Creates the protocol state for a freshly accepted connection.
    #[must_use]
    pub fn new(session_id: SessionId, server: Arc<ServerInfo>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            lifecycle: Lifecycle::new(session_id),
            server,
            registry,
            offered: FeatureSet::all(),
            negotiated: FeatureSet::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.lifecycle.session_id()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Returns the features agreed during `initialize`.
    #[must_use]
    pub fn negotiated(&self) -> &FeatureSet {
        &self.negotiated
    }

    /// Moves the session from `Uninitialized` to `Negotiating`.
    pub fn accept(&mut self) {
        if let Err(err) = self.lifecycle.transition(SessionEvent::Accept) {
            warn!(session_id = %self.session_id(), %err, "accept on an already accepted session");
        }
    }

    /// Marks the session closed because the transport or the server went away.
    pub fn close(&mut self, event: SessionEvent) {
        // TransportClosed and ServerStopped are accepted from every state.
        let _ = self.lifecycle.transition(event);
    }

    /// Handles one inbound text frame.
    pub fn handle_frame(&mut self, text: &str) -> Action {
        match wire::decode(text) {
            Ok(incoming) => self.handle(incoming),
            Err(err) => {
                debug!(session_id = %self.session_id(), %err, "undecodable frame");
                Action::Reply(err.into_response())
            }
        }
    }

    /// Handles one decoded message.
    pub fn handle(&mut self, incoming: Incoming) -> Action {
        match incoming {
            Incoming::Request { id, method, params } => self.handle_request(id, &method, params),
            Incoming::Notification { method, .. } => {
                self.handle_notification(&method);
                Action::None
            }
            Incoming::Reply { id } => {
                debug!(session_id = %self.session_id(), ?id, "ignoring caller response");
                Action::None
            }
        }
    }

    /// Builds the notifier handed to a call running in this session.
    #[must_use]
    pub fn notifier(&self, sink: UnboundedSender<Notification>) -> Notifier {
        if self.negotiated.contains(ProtocolFeature::Notifications) {
            Notifier::new(sink, self.log_level)
        } else {
            Notifier::disabled()
        }
    }

    /// Renders the terminal response of a finished call.
    #[must_use]
    pub fn complete_call(&self, id: RequestId, response: &InvocationResponse) -> Outgoing {
        if let Some(kind) = response.error_kind() {
            debug!(session_id = %self.session_id(), %id, %kind, "call failed");
        }
        Outgoing::response(id, wire::call_result(response))
    }

    fn handle_request(&mut self, id: RequestId, method: &Method, params: Value) -> Action {
        let outcome = match method {
            Method::Ping | Method::Initialized => self.ping(),
            Method::Initialize => self.initialize(params),
            Method::ListTools => self.list_tools(),
            Method::CallTool => {
                return match self.call_tool(params) {
                    Ok(request) => Action::Invoke { id, request },
                    Err(error) => Action::Reply(Outgoing::error(Some(id), error)),
                };
            }
            Method::SetLogLevel => self.set_log_level(params),
            Method::Shutdown => {
                return match self.permit(SessionEvent::Shutdown, None) {
                    Ok(next) => {
                        self.lifecycle = next;
                        info!(session_id = %self.session_id(), "caller requested shutdown");
                        Action::Close(Outgoing::response(id, json!({})))
                    }
                    Err(error) => Action::Reply(Outgoing::error(Some(id), error)),
                };
            }
            Method::Other(_) => Err(RpcError::method_not_found(method)),
        };

        Action::Reply(match outcome {
            Ok(result) => Outgoing::response(id, result),
            Err(error) => Outgoing::error(Some(id), error),
        })
    }

    fn handle_notification(&mut self, method: &Method) {
        match method {
            Method::Initialized if self.state() == SessionState::Ready => {
                debug!(session_id = %self.session_id(), "caller confirmed initialization");
            }
            other => {
                debug!(
                    session_id = %self.session_id(),
                    method = other.as_str(),
                    state = ?self.state(),
                    "ignoring notification"
                );
            }
        }
    }

    /// Checks `event` against the lifecycle and the negotiated features
    /// without committing the transition.
    fn permit(
        &self,
        event: SessionEvent,
        feature: Option<ProtocolFeature>,
    ) -> Result<Lifecycle, RpcError> {
        let mut next = self.lifecycle;
        if let Err(err) = next.transition(event) {
            warn!(session_id = %self.session_id(), %err, "protocol violation");
            return Err(RpcError::protocol_violation(err.to_string()));
        }
        if let Some(feature) = feature {
            if !self.negotiated.contains(feature) {
                warn!(
                    session_id = %self.session_id(),
                    feature = feature.as_str(),
                    "feature used without negotiation"
                );
                return Err(RpcError::protocol_violation(format!(
                    "feature `{}` was not negotiated",
                    feature.as_str()
                )));
            }
        }
        Ok(next)
    }

    fn ping(&self) -> Result<Value, RpcError> {
        if self.state().is_live() {
            Ok(json!({}))
        } else {
            Err(RpcError::protocol_violation(format!(
                "session is {:?}",
                self.state()
            )))
        }
    }

    fn initialize(&mut self, params: Value) -> Result<Value, RpcError> {
        let next = self.permit(SessionEvent::Initialize, None)?;
        let params: InitializeParams = decode_params(params)?;

        self.negotiated = self.offered.intersection(&params.requested_features());
        self.lifecycle = next;

        let protocol_version = params.negotiated_version();
        let client = params.client_info.unwrap_or_default();
        info!(
            session_id = %self.session_id(),
            client = %client.name,
            client_version = %client.version,
            protocol_version,
            features = ?self.negotiated.names(),
            "session initialized"
        );

        let result = InitializeResult {
            protocol_version,
            server_info: ServerInfo::clone(&self.server),
            capabilities: self.negotiated.names(),
        };
        serde_json::to_value(result).map_err(|err| RpcError::invalid_params(err.to_string()))
    }

    fn list_tools(&mut self) -> Result<Value, RpcError> {
        self.lifecycle = self.permit(SessionEvent::ListTools, Some(ProtocolFeature::ToolListing))?;
        let result = ListToolsResult {
            tools: self.registry.listing(),
        };
        serde_json::to_value(result).map_err(|err| RpcError::invalid_params(err.to_string()))
    }

    fn call_tool(&mut self, params: Value) -> Result<InvocationRequest, RpcError> {
        let next = self.permit(SessionEvent::CallTool, Some(ProtocolFeature::ToolInvocation))?;
        let request: InvocationRequest = decode_params(params)?;
        self.lifecycle = next;
        debug!(session_id = %self.session_id(), tool = %request.name, "call accepted");
        Ok(request)
    }

    fn set_log_level(&mut self, params: Value) -> Result<Value, RpcError> {
        let next = self.permit(SessionEvent::SetLogLevel, Some(ProtocolFeature::Notifications))?;
        let SetLevelParams { level } = decode_params(params)?;
        let level: LogLevel = level.parse().map_err(RpcError::invalid_params)?;
        self.lifecycle = next;
        self.log_level = level;
        debug!(session_id = %self.session_id(), %level, "notification level changed");
        Ok(json!({}))
    }
}

fn decode_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_primitives::CapabilitySet;
    use devtools_tools::{
        Arguments, CallContext, ErrorKind, ParamSpec, ParamType, ProviderGroup, RegistryAssembly,
        ToolDefinition, ToolResult,
    };
    use tokio::sync::mpsc;

    use crate::wire::error_codes;

    async fn pong(_args: Arguments, _ctx: CallContext) -> ToolResult<Value> {
        Ok(json!("pong"))
    }

    fn registry() -> Arc<ToolRegistry> {
        let group = ProviderGroup::always("core")
            .with_tool(ToolDefinition::new(
                "ping",
                "Replies with pong.",
                Vec::<ParamSpec>::new(),
                pong,
            ))
            .with_tool(ToolDefinition::new(
                "echo",
                "Echoes its input.",
                vec![ParamSpec::required("text", ParamType::String)],
                pong,
            ));
        Arc::new(
            RegistryAssembly::new()
                .with_group(group)
                .assemble(&CapabilitySet::default())
                .unwrap(),
        )
    }

    fn session() -> SessionProtocol {
        let server = Arc::new(ServerInfo {
            name: "test".to_owned(),
            version: "0.0.0".to_owned(),
        });
        let mut protocol = SessionProtocol::new(SessionId::accept(), server, registry());
        protocol.accept();
        protocol
    }

    fn ready() -> SessionProtocol {
        let mut protocol = session();
        let action = protocol.handle_frame(r#"{"jsonrpc":"2.0","id":0,"method":"initialize"}"#);
        assert!(matches!(action, Action::Reply(Outgoing::Response { .. })));
        protocol
    }

    fn expect_error(action: Action) -> RpcError {
        match action {
            Action::Reply(Outgoing::Error { error, .. }) => error,
            other => panic!("expected an error reply, got {other:?}"),
        }
    }

    fn expect_result(action: Action) -> Value {
        match action {
            Action::Reply(Outgoing::Response { result, .. }) => result,
            other => panic!("expected a result, got {other:?}"),
        }
    }

    #[test]
    fn requests_before_initialize_are_protocol_violations() {
        let mut protocol = session();
        let error = expect_error(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#),
        );
        assert_eq!(error.code, error_codes::PROTOCOL_VIOLATION);
        assert_eq!(error.error_kind(), Some(ErrorKind::ProtocolViolation.as_str()));
        assert_eq!(protocol.state(), SessionState::Negotiating);

        let error = expect_error(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"ping"}}"#,
        ));
        assert_eq!(error.code, error_codes::PROTOCOL_VIOLATION);
    }

    #[test]
    fn ping_is_answered_while_negotiating() {
        let mut protocol = session();
        let result =
            expect_result(protocol.handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#));
        assert_eq!(result, json!({}));
    }

    #[test]
    fn initialize_reports_identity_and_features() {
        let mut protocol = session();
        let result = expect_result(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"inspector","version":"1"}}}"#,
        ));
        assert_eq!(result["serverInfo"]["name"], "test");
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(
            result["capabilities"],
            json!(["tools.list", "tools.call", "notifications"])
        );
        assert_eq!(protocol.state(), SessionState::Ready);

        let error = expect_error(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","id":2,"method":"initialize"}"#),
        );
        assert_eq!(error.code, error_codes::PROTOCOL_VIOLATION);
        assert_eq!(protocol.state(), SessionState::Ready);
    }

    #[test]
    fn listing_matches_registry() {
        let mut protocol = ready();
        let result = expect_result(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#),
        );
        let names: Vec<_> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["ping", "echo"]);
        assert_eq!(result["tools"][1]["parameters"][0]["type"], "string");
        assert_eq!(result["tools"][1]["inputSchema"]["required"], json!(["text"]));
    }

    #[test]
    fn calls_become_invocations() {
        let mut protocol = ready();
        let action = protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":"c1","method":"tools/call","params":{"name":"ping"}}"#,
        );
        let Action::Invoke { id, request } = action else {
            panic!("expected invocation");
        };
        assert_eq!(id, RequestId::String("c1".to_owned()));
        assert_eq!(request.name, "ping");
        assert_eq!(request.arguments, Value::Null);

        let error = expect_error(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call"}"#),
        );
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert_eq!(protocol.state(), SessionState::Ready);
    }

    #[test]
    fn features_outside_the_negotiated_set_are_rejected() {
        let mut protocol = session();
        let result = expect_result(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":["tools.list"]}}"#,
        ));
        assert_eq!(result["capabilities"], json!(["tools.list"]));

        let error = expect_error(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"ping"}}"#,
        ));
        assert_eq!(error.code, error_codes::PROTOCOL_VIOLATION);

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!protocol.notifier(tx).is_enabled());
    }

    #[test]
    fn log_level_filters_notifications() {
        let mut protocol = ready();
        expect_result(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":1,"method":"logging/setLevel","params":{"level":"warning"}}"#,
        ));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = CallContext::new("ping", protocol.notifier(tx));
        assert!(!ctx.info("quiet"));
        assert!(ctx.notify(LogLevel::Error, "loud"));
        assert_eq!(rx.try_recv().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn unknown_log_levels_are_invalid_params() {
        let mut protocol = ready();
        let error = expect_error(protocol.handle_frame(
            r#"{"jsonrpc":"2.0","id":1,"method":"logging/setLevel","params":{"level":"verbose"}}"#,
        ));
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert!(error.message.contains("verbose"));

        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = CallContext::new("ping", protocol.notifier(tx));
        assert!(ctx.info("still at the default level"));
    }

    #[test]
    fn shutdown_closes_after_reply() {
        let mut protocol = ready();
        let action = protocol.handle_frame(r#"{"jsonrpc":"2.0","id":9,"method":"shutdown"}"#);
        assert_eq!(
            action,
            Action::Close(Outgoing::response(RequestId::Number(9), json!({})))
        );
        assert_eq!(protocol.state(), SessionState::Closed);
    }

    #[test]
    fn unknown_methods_and_garbage() {
        let mut protocol = ready();
        let error = expect_error(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#),
        );
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);

        let error = expect_error(protocol.handle_frame("]["));
        assert_eq!(error.code, error_codes::PARSE_ERROR);
        assert_eq!(protocol.state(), SessionState::Ready);

        assert_eq!(
            protocol.handle_frame(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
            Action::None
        );
    }

    #[test]
    fn completed_calls_render_results() {
        let protocol = ready();
        let frame = protocol
            .complete_call(RequestId::Number(4), &InvocationResponse::Success(json!("pong")))
            .to_value();
        assert_eq!(frame["id"], 4);
        assert_eq!(frame["result"]["value"], "pong");
    }
}
