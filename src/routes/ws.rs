use std::collections::HashSet;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::common::AppState;

/// Interval between keep-alive pings.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Commands accepted from clients, e.g. `{"event":"subscribe_tank","data":3}`.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    SubscribeTank(i32),
    UnsubscribeTank(i32),
}

impl ClientCommand {
    /// Apply the command to a connection's tank subscriptions.
    pub fn apply(self, tanks: &mut HashSet<i32>) {
        match self {
            Self::SubscribeTank(id) => {
                tanks.insert(id);
            }
            Self::UnsubscribeTank(id) => {
                tanks.remove(&id);
            }
        }
    }
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Every connection starts on the global channel only and joins tank
/// channels on request. Subscriptions die with the connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut notifications = BroadcastStream::new(state.hub.subscribe());
    let (mut sink, mut stream) = socket.split();
    let mut tanks: HashSet<i32> = HashSet::new();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientCommand>(text.as_str()) {
                        Ok(command) => {
                            tracing::debug!(conn_id = %conn_id, ?command, "WebSocket command");
                            command.apply(&mut tanks);
                        }
                        Err(e) => {
                            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring unknown message");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            outbound = notifications.next() => match outbound {
                Some(Ok(notification)) => {
                    if !notification.channel.reaches(&tanks) {
                        continue;
                    }
                    let frame = match serde_json::to_string(&notification) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(conn_id = %conn_id, error = %e, "Failed to encode notification");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(conn_id = %conn_id, skipped, "WebSocket client lagging, notifications dropped");
                }
                None => break,
            },
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
