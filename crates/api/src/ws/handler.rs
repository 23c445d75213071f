//! The `/api/v1/ws` WebSocket: every bus event, as JSON, to every
//! connected client.
//!
//! Each connection holds its own broadcast receiver, so clients never
//! slow each other (or the dispatch loop) down. A client that lags past
//! the bus buffer skips ahead and keeps going. On connect the client is
//! sent the current session snapshot so it can render immediately
//! without waiting for the next transition.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use beamline_events::PlatformEvent;
use tokio::sync::broadcast;

use crate::state::AppState;

/// Keep-alive ping interval.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/v1/ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.bus.subscribe();

    // Seed the client with the current link state.
    let snapshot = state.session.state().await;
    let seed = PlatformEvent::session_state(snapshot.state.as_str(), snapshot.link_token.as_deref());
    if send_event(&mut socket, &seed).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.reset(); // the first tick fires immediately otherwise

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagged; skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // clients only listen; ignore their frames
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = ping.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("WebSocket client disconnected");
}

/// Serialize one event as `{topic, payload, timestamp}` and send it.
async fn send_event(socket: &mut WebSocket, event: &PlatformEvent) -> Result<(), axum::Error> {
    let frame = serde_json::json!({
        "topic": event.topic.as_str(),
        "payload": event.payload,
        "timestamp": event.timestamp,
    });
    // Serializing a Value cannot fail.
    let text = frame.to_string();
    socket.send(Message::Text(text.into())).await
}
