//! Minimal WebSocket JSON-RPC client for driving a live server.

#![allow(dead_code)]

use std::time::Duration;

use devtools_mcp::config::ServerConfig;
use devtools_mcp::kernel::{McpServer, ServerHandle};
use devtools_mcp::tools::ToolRegistry;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve(registry: ToolRegistry) -> ServerHandle {
    serve_with(ServerConfig::default(), registry).await
}

pub async fn serve_with(config: ServerConfig, registry: ToolRegistry) -> ServerHandle {
    McpServer::new(config.with_port(0), registry)
        .start()
        .await
        .expect("server starts on an ephemeral port")
}

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: i64,
    pub notifications: Vec<Value>,
}

impl Client {
    pub async fn connect(handle: &ServerHandle) -> Self {
        let (ws, _) = connect_async(handle.url()).await.expect("websocket handshake");
        Self {
            ws,
            next_id: 1,
            notifications: Vec::new(),
        }
    }

    pub async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::text(frame.to_string()))
            .await
            .expect("send frame");
    }

    pub async fn ws_send_raw(&mut self, text: &str) {
        self.ws.send(Message::text(text)).await.expect("send frame");
    }

    /// Next JSON frame, or `None` once the server closed the connection.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("server answered in time");
            match message {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("json frame"));
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => {}
            }
        }
    }

    /// Sends a request and returns its response, keeping notifications.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        loop {
            let frame = self.recv().await.expect("connection open");
            if frame.get("id") == Some(&json!(id)) {
                return frame;
            }
            self.notifications.push(frame);
        }
    }

    pub async fn initialize(&mut self) -> Value {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": { "name": "integration-tests", "version": "1.0.0" },
                }),
            )
            .await;
        response["result"].clone()
    }

    /// Calls a tool and returns the `tools/call` result object.
    pub async fn call(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await;
        response["result"].clone()
    }

    pub async fn tool_names(&mut self) -> Vec<String> {
        let response = self.request("tools/list", json!({})).await;
        response["result"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .map(|tool| tool["name"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}
