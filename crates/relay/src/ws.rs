//! Dashboard WebSocket endpoint.
//!
//! `GET /ws` upgrades the connection and streams hub events to the
//! browser. The first frame is always the peer snapshot; anything the
//! client sends back is treated as keep-alive and ignored.

use crate::RelayApp;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::debug;

/// Axum handler for `GET /ws`.
pub async fn dashboard(
    State(app): State<Arc<RelayApp>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app, socket))
}

async fn handle_socket(app: Arc<RelayApp>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (subscriber, mut events) = app.hub.subscribe(&app.registry).await;
    debug!(subscriber, "dashboard client connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    // hub drained us (shutdown)
                    None => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // keep-alive frames, ignored
                    _ => {}
                }
            }
        }
    }

    app.hub.unsubscribe(subscriber).await;
    debug!(subscriber, "dashboard client disconnected");
}
