//! `WS /ws`: subscriber upgrade, greeting, and echo diagnostics.
//!
//! Auth runs after the upgrade completes so the failure can be reported
//! with close code 4401 instead of a bare HTTP rejection.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::StreamExt;
use tracing::debug;

use super::{provided_secret, AuthQuery};
use crate::state::AppState;

/// Close code sent when the shared secret is missing or wrong.
const CLOSE_UNAUTHORIZED: u16 = 4401;

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let provided = provided_secret(&state, &headers, &query);
    ws.on_upgrade(move |socket| handle_socket(socket, state, provided))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, provided: Option<String>) {
    if state.config.auth_enabled() && !state.config.verify_shared_secret(provided.as_deref()) {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_UNAUTHORIZED,
                reason: "unauthorized".into(),
            })))
            .await;
        return;
    }

    let (sink, mut stream) = socket.split();
    let (id, mut closed_rx) = state.hub.connect(sink);
    state.hub.push_to(id, &state.config.ws_greeting);

    loop {
        tokio::select! {
            changed = closed_rx.changed() => {
                // Hub-side eviction (or hub drop) ends the session.
                if changed.is_err() || *closed_rx.borrow() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.hub.push_to(id, &format!("Echo: {text}"));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(id, error = %e, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }
    state.hub.disconnect(id);
}
