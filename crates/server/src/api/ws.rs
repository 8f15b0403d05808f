//! WebSocket support for real-time dashboard updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use archivist_core::SyncEvent;

use super::commands::{self, Command};
use crate::metrics::{
    WS_COMMANDS_RECEIVED, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS,
    WS_MESSAGES_SENT,
};
use crate::state::AppState;

/// Replies queued for a single client.
const REPLY_BUFFER: usize = 16;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot is taken
    let mut rx = state.events().subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<SyncEvent>(REPLY_BUFFER);

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let snapshot = [
        SyncEvent::ChannelList {
            channels: state.registry().list().await,
        },
        commands::sync_state(&state),
    ];

    let send_task = tokio::spawn(async move {
        for event in snapshot {
            if !send_event(&mut sender, &event).await {
                return;
            }
        }

        loop {
            let event = tokio::select! {
                result = rx.recv() => match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
            };

            if !send_event(&mut sender, &event).await {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<Command>(text.as_str()) {
                Ok(command) => {
                    WS_COMMANDS_RECEIVED
                        .with_label_values(&[command.kind()])
                        .inc();
                    if let Some(reply) = commands::handle(&state, command).await {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("Ignoring malformed WebSocket command: {}", e);
                }
            },
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Serialize and send one event. Returns false once the client is gone.
async fn send_event<S>(sender: &mut S, event: &SyncEvent) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize {}: {}", event.kind(), e);
            return true;
        }
    };

    WS_MESSAGES_SENT.with_label_values(&[event.kind()]).inc();
    if sender.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket send failed, client disconnected");
        return false;
    }
    true
}
