//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::fmt::Display;

use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::player::PlayerId;
use crate::game::world::JoinError;
use crate::game::MatchHandle;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{parse_client_frame, ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe first so the first snapshot after seating is not missed
    let snapshot_rx = state.game.subscribe();

    let player_id = match state.game.join(conn_id).await {
        Ok(player_id) => player_id,
        Err(e) => {
            reject(conn_id, &mut ws_sink, &e).await;
            return;
        }
    };
    state.sessions.insert(conn_id, player_id);

    let (width, height) = state.game.arena_size();
    let assigned = ServerMsg::Assigned {
        player_id,
        width,
        height,
    };
    if let Err(e) = send_msg(&mut ws_sink, &assigned).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send assignment");
    } else {
        run_session(conn_id, player_id, &state.game, ws_sink, ws_stream, snapshot_rx).await;
    }

    // Cleanup on disconnect
    state.sessions.remove(&conn_id);
    state.game.leave(player_id).await;

    info!(conn_id = %conn_id, player_id, "WebSocket connection closed");
}

/// Tell a connection why it was not seated, then close it
async fn reject<S>(conn_id: Uuid, sink: &mut S, error: &JoinError)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    info!(conn_id = %conn_id, error = %error, "Rejecting connection");
    let msg = ServerMsg::Error {
        error: error.to_string(),
    };
    if let Err(e) = send_msg(sink, &msg).await {
        debug!(conn_id = %conn_id, error = %e, "Failed to send rejection");
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: Uuid,
    player_id: PlayerId,
    game: &MatchHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    // Spawn writer task: broadcast snapshots -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        conn_id = %conn_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match task
    let reader = read_frames(conn_id, player_id, game, &mut ws_stream);

    // A failed send ends the session just like a closed socket
    tokio::select! {
        _ = reader => {}
        _ = &mut writer_handle => {
            debug!(conn_id = %conn_id, "Writer finished first");
        }
    }

    writer_handle.abort();
}

/// Forward client frames to the match until the socket closes or the match is
/// gone. Malformed and rate-limited frames are dropped without ending the session.
async fn read_frames<R, E>(conn_id: Uuid, player_id: PlayerId, game: &MatchHandle, ws_stream: &mut R)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, player_id, "Rate limited input message");
                    continue;
                }

                let delivered = match parse_client_frame(&text) {
                    Ok(ClientMsg::Input { controller }) => {
                        game.send_input(player_id, controller).await
                    }
                    Ok(ClientMsg::Rematch) => game.rematch(player_id).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, player_id, error = %e, "Ignoring malformed frame");
                        true
                    }
                };
                if !delivered {
                    debug!(conn_id = %conn_id, "Match channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
