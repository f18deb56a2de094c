//! WebSocket observer channel.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use patrol_hub::ObserverConnection;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// WebSocket upgrade handler.
///
/// The observer is registered before the upgrade completes, so the client
/// receives every event broadcast after its handshake response.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let connection = match state.hub().connect() {
        Ok(connection) => connection,
        Err(e) => {
            warn!(
                observers = state.hub().observer_count(),
                error = %e,
                "Refusing WebSocket observer"
            );
            return ApiError::Unavailable(e.to_string()).into_response();
        }
    };

    info!(
        observer = %connection.id(),
        observers = state.hub().observer_count(),
        "New WebSocket observer"
    );

    let write_timeout = state.hub().config().write_timeout();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, connection, write_timeout))
}

/// Forward hub frames to the socket until either side goes away.
async fn handle_ws_connection(
    socket: WebSocket,
    mut connection: ObserverConnection,
    write_timeout: Duration,
) {
    let observer = connection.id();
    let (mut sender, mut receiver) = socket.split();

    // Inbound frames only tell us the client is still there.
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                Ok(_) => {}
            }
        }
    });

    loop {
        tokio::select! {
            frame = connection.recv() => {
                let Some(frame) = frame else {
                    debug!(observer = %observer, "Hub dropped observer");
                    break;
                };
                let message = Message::Text(frame.to_string().into());
                match tokio::time::timeout(write_timeout, sender.send(message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(observer = %observer, error = %e, "Failed to send frame, client disconnected");
                        break;
                    }
                    Err(_) => {
                        warn!(observer = %observer, "WebSocket write timed out");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!(observer = %observer, "Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    drop(connection);

    info!(observer = %observer, "WebSocket observer closed");
}
