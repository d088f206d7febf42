//! Session driver.
//!
//! Reads one session's frames strictly in order, runs each call on the
//! session's own worker pool and writes everything the call produces through the outbound
//! queue: notifications first, then the terminal response. The driver is
//! transport-agnostic; the WebSocket glue feeds it through channels.

use devtools_tools::{
    CallContext, Dispatcher, ErrorKind, InvocationRequest, InvocationResponse,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::lifecycle::{SessionEvent, SessionState};
use crate::protocol::{Action, SessionProtocol};
use crate::scheduler::{SchedulerResult, TaskScheduler};
use crate::wire::{Outgoing, RequestId};

/// Frames handed to the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    /// A serialized JSON-RPC message.
    Text(String),
    /// Close the transport after everything queued before it.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) struct SessionDriver {
    protocol: SessionProtocol,
    dispatcher: Dispatcher,
    scheduler: TaskScheduler,
    outbound: mpsc::Sender<Outbound>,
    /// Cancelled when the transport closes or the server stops.
    closed: CancellationToken,
    /// Cancelled only when the server stops.
    stopping: CancellationToken,
}

impl SessionDriver {
    pub(crate) fn new(
        protocol: SessionProtocol,
        dispatcher: Dispatcher,
        scheduler: TaskScheduler,
        outbound: mpsc::Sender<Outbound>,
        closed: CancellationToken,
        stopping: CancellationToken,
    ) -> Self {
        Self {
            protocol,
            dispatcher,
            scheduler,
            outbound,
            closed,
            stopping,
        }
    }

    /// Runs the session until the caller shuts it down, the transport
    /// closes or the server stops.
    pub(crate) async fn run(mut self, mut inbound: mpsc::Receiver<String>) {
        self.protocol.accept();
        let session_id = self.protocol.session_id();
        info!(%session_id, "session opened");

        loop {
            let frame = tokio::select! {
                biased;
                () = self.closed.cancelled() => None,
                frame = inbound.recv() => frame,
            };
            let Some(text) = frame else {
                break;
            };

            let flow = match self.protocol.handle_frame(&text) {
                Action::None => Flow::Continue,
                Action::Reply(frame) => self.send(&frame).await,
                Action::Invoke { id, request } => self.invoke(id, request).await,
                Action::Close(frame) => {
                    self.send(&frame).await;
                    Flow::Stop
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }

        self.finish().await;
        info!(%session_id, "session closed");
    }

    async fn invoke(&self, id: RequestId, request: InvocationRequest) -> Flow {
        let session_id = self.protocol.session_id();
        let tool = request.name.clone();
        let (sink, mut notifications) = mpsc::unbounded_channel();
        let ctx = CallContext::new(tool.as_str(), self.protocol.notifier(sink));
        let dispatcher = self.dispatcher.clone();

        let spawned = self
            .scheduler
            .spawn(async move { dispatcher.invoke(request, ctx).await });
        let mut call = match spawned {
            Ok(handle) => AbortOnDrop(handle),
            Err(err) => {
                let response = InvocationResponse::failure(ErrorKind::ExecutionFailed, err.to_string());
                return self.send(&self.protocol.complete_call(id, &response)).await;
            }
        };

        let joined = loop {
            tokio::select! {
                biased;
                () = self.closed.cancelled() => {
                    debug!(%session_id, %tool, "cancelling in-flight call");
                    return Flow::Stop;
                }
                Some(notification) = notifications.recv() => {
                    if self.send(&Outgoing::message(&notification)).await == Flow::Stop {
                        return Flow::Stop;
                    }
                }
                joined = &mut call.0 => break joined,
            }
        };

        while let Ok(notification) = notifications.try_recv() {
            if self.send(&Outgoing::message(&notification)).await == Flow::Stop {
                return Flow::Stop;
            }
        }

        let response = settle(joined);
        self.send(&self.protocol.complete_call(id, &response)).await
    }

    async fn send(&self, frame: &Outgoing) -> Flow {
        match self.outbound.send(Outbound::Text(frame.to_text())).await {
            Ok(()) => Flow::Continue,
            Err(_) => {
                debug!(session_id = %self.protocol.session_id(), "transport writer gone");
                Flow::Stop
            }
        }
    }

    async fn finish(&mut self) {
        if self.protocol.state() != SessionState::Closed {
            if self.stopping.is_cancelled() {
                self.send(&Outgoing::shutdown_notice("server stopping")).await;
                self.protocol.close(SessionEvent::ServerStopped);
            } else {
                self.protocol.close(SessionEvent::TransportClosed);
            }
        }
        self.scheduler.close();
        let _ = self.outbound.send(Outbound::Close).await;
    }
}

fn settle(
    joined: Result<SchedulerResult<InvocationResponse>, tokio::task::JoinError>,
) -> InvocationResponse {
    match joined {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => InvocationResponse::failure(ErrorKind::ExecutionFailed, err.to_string()),
        Err(err) if err.is_panic() => {
            InvocationResponse::failure(ErrorKind::ExecutionFailed, "tool call panicked")
        }
        Err(_) => InvocationResponse::failure(ErrorKind::ExecutionFailed, "tool call was cancelled"),
    }
}
