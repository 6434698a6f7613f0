//! # Relay Web Server
//!
//! Accepts WebSocket connections on any path and fans every binary message
//! out to all other open connections. Each connection gets a reader loop
//! (this task) and a writer task draining the connection's bounded queue in
//! the [`RelayHub`], so a stalled peer only ever blocks itself.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;

use super::hub::RelayHub;

/// Bind `addr` and serve until the listener fails.
pub async fn start_server(addr: SocketAddr, hub: Arc<RelayHub>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, hub).await
}

/// Serve the relay on an already bound listener.
pub async fn serve(listener: TcpListener, hub: Arc<RelayHub>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/", get(handle_websocket))
        .fallback(handle_websocket)
        .with_state(hub);

    log::info!("[relay] Listening on ws://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_websocket(ws: WebSocketUpgrade, State(hub): State<Arc<RelayHub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Manages a single participant connection.
async fn handle_socket(socket: WebSocket, hub: Arc<RelayHub>) {
    let (id, mut outbound) = hub.connect();
    log::info!(
        "[relay] connection {} opened ({} connected)",
        id,
        hub.connection_count()
    );

    let (mut sink, mut stream) = socket.split();

    // Forward queued payloads to this peer, in the order they were queued
    let writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if sink.send(Message::Binary(payload)).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Binary(payload)) => {
                log::info!("[relay] {}: {} bytes", id, payload.len());
                let fan_out = hub.broadcast(id, payload);
                log::debug!(
                    "[relay] {}: delivered {}, dropped {}, skipped {}",
                    id,
                    fan_out.delivered,
                    fan_out.dropped,
                    fan_out.skipped
                );
            }
            Ok(Message::Text(text)) => {
                log::warn!(
                    "[relay] {}: ignoring {} byte text frame",
                    id,
                    text.len()
                );
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by the transport
            Err(e) => {
                log::debug!("[relay] {}: read error: {}", id, e);
                break;
            }
        }
    }

    hub.disconnect(id);
    writer.abort();
    log::info!(
        "[relay] connection {} closed ({} connected)",
        id,
        hub.connection_count()
    );
}
