//! The one WebSocket route: upgrade, authenticate, register with the hub,
//! then run a reader task and a writer task back to back until either side
//! closes. See §4.6.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::auth::AuthVerifier;
use crate::hub::ConnectionHub;
use crate::protocol::ClientEvent;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub auth: Arc<AuthVerifier>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_id = query.token.as_deref().and_then(|token| state.auth.verify(token));
    ws.on_upgrade(move |socket| run_connection(socket, state.hub, user_id))
}

#[instrument(skip_all)]
async fn run_connection(socket: WebSocket, hub: Arc<ConnectionHub>, user_id: Option<String>) {
    let (client_id, mut outbox) = hub.connect(user_id);
    debug!(%client_id, "client connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%err, "failed to serialize outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => hub.handle_message(client_id, event),
                Err(err) => debug!(%client_id, %err, "dropping malformed client frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.disconnect(client_id);
    writer.abort();
    debug!(%client_id, "client disconnected");
}
