pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod hub;
pub mod registry;
pub mod session;

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::state::AppState;
use heartbeat::WRITER_GRACE;
use session::{Admission, Disconnect};

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, remote, state))
}

async fn handle_socket(socket: WebSocket, remote: SocketAddr, state: AppState) {
    let id = remote.to_string();
    let (mut ws_sink, mut ws_stream) = socket.split();

    let Admission {
        key,
        identity,
        preamble,
        outbound,
        mut evicted,
    } = match state.hub.admit(&id).await {
        Ok(admission) => admission,
        Err(e) => {
            tracing::warn!(session = %id, "admission failed: {e}");
            let _ = ws_sink.send(Message::Close(None)).await;
            let _ = ws_sink.close().await;
            return;
        }
    };
    tracing::info!(session = %id, name = %identity.user_name, "client connected");

    let session_config = state.session.clone();
    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        if let Err(e) = session::write_pump(ws_sink, preamble, outbound, &session_config).await {
            tracing::debug!(session = %writer_id, "outbound pump stopped: {e}");
        }
    });

    let reason = session::read_pump(
        &mut ws_stream,
        &state.hub,
        key,
        &id,
        state.session.idle_timeout,
        &mut writer,
        &mut evicted,
    )
    .await;

    state.hub.unregister(key).await;
    tracing::info!(session = %id, %reason, "client disconnected");

    // The queue is closed now, so the writer flushes, sends a close frame and
    // exits. An evicted peer has usually stopped reading, so its writer may
    // be stuck on a full socket; don't wait for it forever.
    if reason != Disconnect::WriterGone
        && tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err()
    {
        writer.abort();
    }
}
