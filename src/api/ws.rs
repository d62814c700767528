use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::api::events::{ClientMessage, ServerMessage};
use crate::api::server::AppState;
use crate::matchmaking::registry::ClientId;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let client_id = ClientId::new();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);
    state.matchmaker.connect(client_id, addr, tx).await;

    let (mut sink, mut stream) = socket.split();

    // Pump queued server messages out to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else {
                break;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Events from one connection are handled to completion, in order.
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(event) => state.matchmaker.handle(client_id, event).await,
                // Malformed payloads stop here and are never forwarded.
                Err(e) => {
                    tracing::debug!(client = %client_id, error = %e, "dropping malformed payload");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.matchmaker.disconnect(client_id).await;
    send_task.abort();
}
