//! WebSocket handler for real-time reading streaming
//!
//! Each connection is one hub subscriber. The server sends one text frame
//! per published reading and pings every keep-alive period; anything the
//! client sends only proves it is alive. A socket that stays silent for
//! three keep-alive periods is closed.

use std::time::Duration;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, stream::StreamExt};
use tokio::time;
use tracing::{debug, info, trace};

use crate::actors::{BroadcastHandle, Subscription};
use crate::api::{error::ApiError, state::ApiState};

/// Silent keep-alive periods tolerated before a socket is dropped
const IDLE_PERIODS: u32 = 3;

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
///
/// The subscriber is registered before the upgrade so a full hub answers
/// 503 instead of accepting a socket it cannot serve.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    let subscription = match state.hub.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => return ApiError::Unavailable(e.to_string()).into_response(),
    };

    let hub = state.hub.clone();
    let keepalive = state.keepalive;
    ws.on_upgrade(move |socket| handle_websocket(socket, subscription, hub, keepalive))
}

/// Handle WebSocket connection
async fn handle_websocket(
    socket: WebSocket,
    mut subscription: Subscription,
    hub: BroadcastHandle,
    keepalive: Duration,
) {
    let id = subscription.id();
    info!("WebSocket subscriber {id} connected");

    let (mut sender, mut receiver) = socket.split();

    // Forward hub payloads and keep-alive pings to the client
    let mut send_task = tokio::spawn(async move {
        let mut ping = time::interval(keepalive);
        ping.tick().await;

        loop {
            tokio::select! {
                payload = subscription.recv() => match payload {
                    Some(payload) => {
                        if sender.send(Message::Text(payload.to_string())).await.is_err() {
                            debug!("WebSocket send failed, client disconnected");
                            break;
                        }
                    }
                    None => {
                        debug!("hub dropped subscriber {id}");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                },

                _ = ping.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        debug!("WebSocket ping failed, client disconnected");
                        break;
                    }
                }
            }
        }
    });

    // Watch for client frames; any frame resets the idle deadline
    let idle = keepalive * IDLE_PERIODS;
    let mut recv_task = tokio::spawn(async move {
        loop {
            match time::timeout(idle, receiver.next()).await {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                Ok(Some(Ok(_))) => trace!("frame from subscriber {id}"),
                Ok(Some(Err(e))) => {
                    debug!("WebSocket receive error: {e}");
                    break;
                }
                Err(_) => {
                    debug!("subscriber {id} silent for {idle:?}, closing");
                    break;
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    hub.unsubscribe(id).await;
    info!("WebSocket subscriber {id} disconnected");
}
