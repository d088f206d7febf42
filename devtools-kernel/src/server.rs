//! Listener lifecycle: pure construction, `start`, and a handle to stop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use devtools_config::ServerConfig;
use devtools_tools::{Dispatcher, ToolRegistry};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::transport::serve_socket;
use crate::wire::ServerInfo;

const HEALTH_PATH: &str = "/health";

/// Errors raised while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured endpoint path cannot be routed.
    #[error("invalid endpoint path `{path}`: {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The accept loop failed.
    #[error("listener failed: {0}")]
    Serve(#[source] io::Error),
    /// The listener task panicked or was aborted.
    #[error("listener task failed: {0}")]
    Join(#[from] JoinError),
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// State shared by every connection.
#[derive(Debug)]
pub(crate) struct ServerState {
    pub(crate) server: Arc<ServerInfo>,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) dispatcher: Dispatcher,
    /// One permit per open session.
    pub(crate) session_slots: Arc<Semaphore>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) sessions: TaskTracker,
}

/// A configured but not yet listening server.
///
/// Construction performs no I/O; nothing is bound until [`McpServer::start`].
#[derive(Debug)]
pub struct McpServer {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Pairs a configuration with an assembled registry.
    #[must_use]
    pub fn new(config: ServerConfig, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        Self {
            config,
            registry: registry.into(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the registry served to every session.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Binds the listener and starts accepting sessions.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidPath`] for an unroutable endpoint path and
    /// [`ServerError::Bind`] when the port cannot be bound.
    pub async fn start(self) -> ServerResult<ServerHandle> {
        let path = self.config.path.clone();
        validate_path(&path)?;

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let sessions = TaskTracker::new();
        let session_slots = Arc::new(Semaphore::new(self.config.max_sessions.max(1)));
        let state = Arc::new(ServerState {
            server: Arc::new(ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            }),
            dispatcher: Dispatcher::new(Arc::clone(&self.registry)),
            registry: self.registry,
            session_slots,
            shutdown: shutdown.clone(),
            sessions: sessions.clone(),
        });

        let router = Router::new()
            .route(&path, get(upgrade))
            .route(HEALTH_PATH, get(health))
            .with_state(state);

        let signal = shutdown.clone();
        let listener = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(%local_addr, %path, "MCP server listening");

        Ok(ServerHandle {
            local_addr,
            path,
            shutdown,
            sessions,
            listener: Some(listener),
        })
    }
}

fn validate_path(path: &str) -> ServerResult<()> {
    let reason = if !path.starts_with('/') {
        "must start with `/`"
    } else if path == HEALTH_PATH {
        "reserved for the health check"
    } else if path.contains(['{', '}', '*', ':']) {
        "must be a literal path"
    } else {
        return Ok(());
    };
    Err(ServerError::InvalidPath {
        path: path.to_owned(),
        reason,
    })
}

async fn upgrade(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Ok(slot) = Arc::clone(&state.session_slots).try_acquire_owned() else {
        debug!("session limit reached; refusing upgrade");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| {
        sessions.track_future(async move {
            serve_socket(socket, state).await;
            drop(slot);
        })
    })
}

async fn health() -> &'static str {
    "ok"
}

/// Handle to a running server. Dropping it stops the server without waiting.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    path: String,
    shutdown: CancellationToken,
    sessions: TaskTracker,
    listener: Option<JoinHandle<io::Result<()>>>,
}

impl ServerHandle {
    /// Returns the bound address; useful when the configured port was `0`.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL of the endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.path)
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops accepting connections, notifies and closes every session,
    /// cancels in-flight calls and waits until the port is released.
    ///
    /// # Errors
    ///
    /// Surfaces a failure of the accept loop.
    pub async fn stop(mut self) -> ServerResult<()> {
        info!(local_addr = %self.local_addr, "stopping MCP server");
        self.signal_stop();
        self.sessions.close();
        self.sessions.wait().await;
        debug!(local_addr = %self.local_addr, "all sessions closed");

        if let Some(listener) = self.listener.take() {
            listener.await?.map_err(ServerError::Serve)?;
        }
        info!(local_addr = %self.local_addr, "MCP server stopped");
        Ok(())
    }

    fn signal_stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.signal_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn ephemeral() -> ServerConfig {
        ServerConfig::default().with_port(0)
    }

    async fn get_health(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn health_endpoint_answers() {
        let handle = McpServer::new(ephemeral(), ToolRegistry::empty())
            .start()
            .await
            .unwrap();
        let response = get_health(handle.local_addr()).await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_releases_the_port() {
        let handle = McpServer::new(ephemeral(), ToolRegistry::empty())
            .start()
            .await
            .unwrap();
        let addr = handle.local_addr();
        handle.stop().await.unwrap();

        let again = McpServer::new(ephemeral().with_port(addr.port()), ToolRegistry::empty())
            .start()
            .await
            .unwrap();
        assert_eq!(again.local_addr(), addr);
        again.stop().await.unwrap();
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let first = McpServer::new(ephemeral(), ToolRegistry::empty())
            .start()
            .await
            .unwrap();
        let taken = first.local_addr().port();

        let err = McpServer::new(ephemeral().with_port(taken), ToolRegistry::empty())
            .start()
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        first.stop().await.unwrap();
    }

    /// Sends a WebSocket upgrade request and returns the open stream with
    /// the response head.
    async fn request_upgrade(addr: SocketAddr) -> (TcpStream, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /mcp HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\n\
                  Upgrade: websocket\r\nSec-WebSocket-Version: 13\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
            )
            .await
            .unwrap();
        let mut head = [0_u8; 64];
        let read = stream.read(&mut head).await.unwrap();
        let status = String::from_utf8_lossy(&head[..read]).into_owned();
        (stream, status)
    }

    #[tokio::test]
    async fn upgrades_beyond_the_session_limit_are_refused() {
        let handle = McpServer::new(ephemeral().with_max_sessions(1), ToolRegistry::empty())
            .start()
            .await
            .unwrap();
        let addr = handle.local_addr();

        let (_open, accepted) = request_upgrade(addr).await;
        assert!(accepted.starts_with("HTTP/1.1 101"), "{accepted}");

        let (_, refused) = request_upgrade(addr).await;
        assert!(refused.starts_with("HTTP/1.1 503"), "{refused}");
        handle.stop().await.unwrap();
    }

    #[test]
    fn unroutable_paths_are_rejected() {
        assert!(validate_path("/mcp").is_ok());
        assert!(validate_path("mcp").is_err());
        assert!(validate_path("/health").is_err());
        assert!(validate_path("/{id}").is_err());
    }

    #[test]
    fn construction_is_pure() {
        let server = McpServer::new(ServerConfig::default(), ToolRegistry::empty());
        assert_eq!(server.config().port, 9999);
        assert!(server.registry().is_empty());
    }
}
