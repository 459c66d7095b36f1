use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::app_state::AppState;
use crate::models::message::ClientMessage;
use crate::services::gateway::Gateway;

/// GET /ws: Upgrade to a WebSocket served by the gateway.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway))
}

/// Drive one connection: a writer task drains the gateway channel into the
/// sink while this task decodes inbound frames. Disconnect cleanup runs once,
/// when the read side ends.
async fn handle_socket(socket: WebSocket, gateway: Arc<Gateway>) {
    let (conn_id, mut rx) = gateway.connect();
    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(payload.into())).await.is_err() {
                tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                return;
            }
        }
        // Channel closed by the hub (shutdown): close the socket.
        let _ = sink.send(Message::Close(None)).await;
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => gateway.handle_message(conn_id, msg),
                Err(e) => gateway.reject_frame(conn_id, &e.to_string()),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    gateway.disconnect(conn_id);
    send_task.abort();
}
