//! WebSocket glue between axum and the session driver.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use devtools_primitives::SessionId;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::SessionProtocol;
use crate::scheduler::{SchedulerConfig, TaskScheduler};
use crate::server::ServerState;
use crate::session::{Outbound, SessionDriver};

/// Frames read ahead while a call is executing.
const INBOUND_QUEUE: usize = 64;
/// Frames waiting for the socket writer.
const OUTBOUND_QUEUE: usize = 256;
/// Calls one session may run at once. Frames are handled in order, so a
/// second slot would never be used.
const CALLS_PER_SESSION: usize = 1;
/// How long the writer may take to flush once the session has ended.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Serves one upgraded connection until its session ends.
pub(crate) async fn serve_socket(socket: WebSocket, state: Arc<ServerState>) {
    let session_id = SessionId::accept();
    let (mut sink, mut stream) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_QUEUE);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
    let closed = state.shutdown.child_token();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    let reader_closed = closed.clone();
    let reader = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                () = reader_closed.cancelled() => break,
                message = stream.next() => message,
            };
            let text = match message {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        debug!(%session_id, "dropping non UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(%session_id, %err, "websocket read failed");
                    break;
                }
            };
            if inbound_tx.send(text).await.is_err() {
                break;
            }
        }
        reader_closed.cancel();
    });

    let protocol = SessionProtocol::new(
        session_id,
        Arc::clone(&state.server),
        Arc::clone(&state.registry),
    );
    SessionDriver::new(
        protocol,
        state.dispatcher.clone(),
        TaskScheduler::new(SchedulerConfig::with_limit(CALLS_PER_SESSION)),
        outbound_tx,
        closed.clone(),
        state.shutdown.clone(),
    )
    .run(inbound_rx)
    .await;

    closed.cancel();
    if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        debug!(%session_id, "writer did not flush in time");
        writer.abort();
    }
    let _ = reader.await;
}
