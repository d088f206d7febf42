//! Lifecycle state machine for caller sessions.

use devtools_primitives::SessionId;
use thiserror::Error;
use tracing::debug;

/// States a session can occupy between connection accept and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session object exists but the connection has not been accepted yet.
    Uninitialized,
    /// Connection accepted; waiting for `initialize`.
    Negotiating,
    /// Capabilities agreed; tools can be listed and called.
    Ready,
    /// Session ended; no further messages are accepted.
    Closed,
}

impl SessionState {
    /// Returns `true` while the session accepts requests.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Negotiating | Self::Ready)
    }

    /// Returns `true` once the session has closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Events that drive session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport accepted the connection.
    Accept,
    /// The caller sent `initialize`.
    Initialize,
    /// The caller asked for the tool listing.
    ListTools,
    /// The caller invoked a tool.
    CallTool,
    /// The caller adjusted its notification level.
    SetLogLevel,
    /// The caller requested a graceful shutdown.
    Shutdown,
    /// The underlying transport went away.
    TransportClosed,
    /// The server is stopping.
    ServerStopped,
}

/// Session state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    session_id: SessionId,
    state: SessionState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given session.
    #[must_use]
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::Uninitialized,
        }
    }

    /// Returns the owning session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// accepted in the current state. The state is left unchanged.
    pub fn transition(&mut self, event: SessionEvent) -> LifecycleResult<SessionState> {
        let next = match (self.state, event) {
            (SessionState::Uninitialized, SessionEvent::Accept) => Some(SessionState::Negotiating),
            (SessionState::Negotiating, SessionEvent::Initialize)
            | (
                SessionState::Ready,
                SessionEvent::ListTools | SessionEvent::CallTool | SessionEvent::SetLogLevel,
            ) => Some(SessionState::Ready),
            (SessionState::Ready, SessionEvent::Shutdown)
            | (_, SessionEvent::TransportClosed | SessionEvent::ServerStopped) => {
                Some(SessionState::Closed)
            }
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                session_id: self.session_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                session_id = %self.session_id,
                ?self.state,
                ?next_state,
                ?event,
                "session lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The event is not accepted in the current state.
    #[error("{event:?} is not accepted while session {session_id} is {from:?}")]
    InvalidTransition {
        /// Session whose transition failed.
        session_id: SessionId,
        /// State prior to the attempted transition.
        from: SessionState,
        /// Event that triggered the failure.
        event: SessionEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
