//! Notification hub WebSocket route.
//!
//! Each connection registers a hub client and forwards its queue to the
//! socket as text frames.

use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::WEBSOCKET_PATH;
use crate::api::server::AppState;
use crate::notification::NotificationHub;

/// Heartbeat interval in seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route(WEBSOCKET_PATH, get(websocket_handler))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let hub = state
        .notification_hub
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Notification hub not available"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub)))
}

/// Pump hub messages to the socket until either side goes away.
async fn handle_socket(socket: WebSocket, hub: std::sync::Arc<NotificationHub>) {
    let (client_id, mut queue) = hub.add_client();
    let (mut sender, mut receiver) = socket.split();

    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    // The first tick completes immediately.
    heartbeat_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%client_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Ok(_)) => {
                        // Clients have nothing to say; drain and ignore.
                    }
                    Some(Err(e)) => {
                        debug!(%client_id, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            payload = queue.recv() => {
                let Some(payload) = payload else {
                    // Pruned by the hub.
                    break;
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    debug!(%client_id, "Failed to send hub message, client disconnected");
                    break;
                }
            }

            _ = heartbeat_interval.tick() => {
                if awaiting_pong {
                    debug!(%client_id, "Client did not answer heartbeat, closing");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
        }
    }

    hub.remove_client(&client_id);
    let _ = sender.close().await;
}
