//! WebSocket transport gateway
//!
//! One socket per client. Inbound text messages carry control commands and
//! frames; outbound messages are the per-tick `metricsUpdate` snapshots,
//! drained from the connection's bounded queue by a dedicated send task.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use neurolink_common::events::{ClientMessage, MetricsUpdate};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::registry::ConnectionId;
use crate::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    serve_connection(state, Uuid::new_v4(), sink, stream).await;
}

/// Run one client connection until either direction ends
///
/// Registers `connection`, pumps queued snapshots into `sink` and applies
/// messages read from `stream`. The session is unregistered on return.
pub async fn serve_connection<S, R, E>(
    state: AppState,
    connection: ConnectionId,
    mut sink: S,
    mut stream: R,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<MetricsUpdate>(state.outbound_queue);
    if !state.registry.register(connection, tx).await {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            let text = match serde_json::to_string(&update) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize metrics update: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let inflight = Arc::new(Semaphore::new(state.max_inflight_frames));
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_client_message(&recv_state, connection, &inflight, msg).await,
                    Err(e) => debug!("Ignoring malformed message from {}: {}", connection, e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either side ending closes the connection
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unregister(connection).await;
}

/// Apply one client message for `connection`
///
/// Frames are handed to the pipeline on a separate task so the socket keeps
/// reading; when `inflight` has no permit left the frame is dropped.
pub async fn handle_client_message(
    state: &AppState,
    connection: ConnectionId,
    inflight: &Arc<Semaphore>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Start(start) => {
            state
                .registry
                .start(connection, start.into(), Instant::now())
                .await;
        }
        ClientMessage::Stop => {
            state.registry.stop(connection).await;
        }
        ClientMessage::Frame { encoded_image } => {
            let Ok(permit) = Arc::clone(inflight).try_acquire_owned() else {
                debug!("Frame from {} dropped: previous frame still in flight", connection);
                return;
            };
            let pipeline = state.pipeline.clone();
            tokio::spawn(async move {
                pipeline.process(connection, encoded_image).await;
                drop(permit);
            });
        }
    }
}
