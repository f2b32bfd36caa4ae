//! WebSocket Handler
//!
//! Upgrades `GET /api/users/watch` and runs the change delivery loop for
//! the lifetime of the connection.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use super::messages::ServerMessage;
use crate::api::dto::WatchQuery;
use crate::api::AppState;
use crate::notifier::{self, ChangeEvent, EventSink, NotifierError, SinkError, WatchExit};

/// WebSocket upgrade handler
///
/// This is the entry point for watch connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WatchQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.subscriber_id))
}

/// Writes change events to the client as JSON text frames
struct WebSocketSink {
    sender: SplitSink<WebSocket, Message>,
}

impl WebSocketSink {
    async fn send_message(&mut self, message: &ServerMessage) -> Result<(), SinkError> {
        let text = serde_json::to_string(message).map_err(|e| SinkError(e.to_string()))?;
        self.sender
            .send(Message::Text(text))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sender.send(Message::Close(None)).await;
    }
}

#[async_trait]
impl EventSink for WebSocketSink {
    async fn send(&mut self, event: &ChangeEvent) -> Result<(), SinkError> {
        self.send_message(&ServerMessage::from(event)).await
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subscriber_id: Option<String>) {
    let (sender, mut receiver) = socket.split();
    let mut sink = WebSocketSink { sender };

    let subscriber_id = subscriber_id.unwrap_or_else(notifier::new_subscriber_id);
    let cancel = state.shutdown.child_token();

    // Clients only ever close; anything else they send is ignored
    let reader_cancel = cancel.clone();
    let reader_id = subscriber_id.clone();
    let reader = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(subscriber_id = %reader_id, "Client requested close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        subscriber_id = %reader_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
        reader_cancel.cancel();
    });

    tracing::info!(subscriber_id = %subscriber_id, "Watch connection opened");

    let result = notifier::watch(
        &state.notifier,
        Some(subscriber_id.clone()),
        cancel.clone(),
        &mut sink,
    )
    .await;

    reader.abort();

    match result {
        Ok(WatchExit::Cancelled) if state.shutdown.is_cancelled() => {
            tracing::info!(subscriber_id = %subscriber_id, "Watch ended by server shutdown");
            sink.close().await;
        }
        Ok(WatchExit::Cancelled) => {
            tracing::info!(subscriber_id = %subscriber_id, "Watch connection closed");
        }
        Ok(WatchExit::Closed) => {
            tracing::info!(subscriber_id = %subscriber_id, "Watch ended by server shutdown");
            sink.close().await;
        }
        Err(NotifierError::Delivery(e)) => {
            tracing::debug!(subscriber_id = %subscriber_id, error = %e, "Watch client gone");
        }
        Err(e) => {
            tracing::warn!(subscriber_id = %subscriber_id, error = %e, "Failed to start watch");
            let _ = sink
                .send_message(&ServerMessage::Error {
                    message: e.to_string(),
                })
                .await;
            sink.close().await;
        }
    }
}
