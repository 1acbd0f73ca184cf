//! WebSocket event bus endpoint.
//!
//! On connect: send a welcome frame, subscribe to the one process-wide
//! topic, ACK inbound client frames with `"ACK: "` + payload. Lagging
//! subscribers are handled gracefully: `RecvError::Lagged` is counted and
//! folded into the next delivered frame rather than disconnecting the
//! client.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use tracing::{debug, error, info};

use super::AppState;
use crate::events::TOPIC;

pub async fn events_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let bus = state.bus;
    ws.on_upgrade(|socket| handle_socket(socket, bus))
}

async fn handle_socket(mut socket: WebSocket, bus: crate::events::EventBus) {
    info!("new WebSocket client connected");

    let welcome = serde_json::json!({
        "type": "welcome",
        "topic": TOPIC,
    });
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = socket.send(Message::Text(json)).await;
    }

    let mut rx = bus.subscribe();
    let mut dropped_count: usize = 0;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if dropped_count > 0 {
                            let notice = serde_json::json!({
                                "type": "backpressure",
                                "droppedCount": dropped_count,
                            });
                            if let Ok(json) = serde_json::to_string(&notice) {
                                let _ = socket.send(Message::Text(json)).await;
                            }
                            dropped_count = 0;
                        }

                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if let Err(e) = socket.send(Message::Text(json)).await {
                                    error!("failed to send event to client: {}", e);
                                    break;
                                }
                            }
                            Err(e) => error!("failed to serialize event: {}", e),
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        dropped_count += n as usize;
                        debug!("client lagging, dropped {} events (total {})", n, dropped_count);
                    }
                    Err(e) => {
                        error!("event channel error: {}", e);
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        debug!("client closed connection");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        let ack = format!("ACK: {}", text);
                        if socket.send(Message::Text(ack)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket closed");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}
