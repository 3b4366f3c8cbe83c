//! Per-client WebSocket sessions.
//!
//! Each connection runs two tasks: a reader that decodes client messages
//! and dispatches them into the server context, and a writer that drains
//! the subscriber's outbound channel under a per-send deadline. Either
//! side failing tears the session down; teardown always funnels through
//! [`Server::disconnect`] so world and journal cleanup happen exactly
//! once.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use gritfall_proto::codec::{decode_client, encode_server};
use gritfall_proto::server::ServerBody;

use crate::SharedServer;

/// Outbound channel depth per subscriber. A client that cannot drain this
/// many frames is treated as backpressured and disconnected.
const OUTBOUND_DEPTH: usize = 64;

/// Drive one accepted WebSocket until it closes.
pub async fn run(server: SharedServer, socket: WebSocket, player_id: String) {
    let (ws_tx, ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<String>(OUTBOUND_DEPTH);

    if let Err(err) = server.subscribe(&player_id, out_tx.clone()) {
        // Duplicate subscription: close with policy violation.
        warn!(player = %player_id, %err, "subscription rejected");
        let mut ws_tx = ws_tx;
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "duplicate subscription".into(),
            })))
            .await;
        return;
    }
    debug!(player = %player_id, "session started");

    let mut writer = tokio::spawn(run_writer(server.clone(), ws_tx, out_rx, player_id.clone()));
    let mut reader = tokio::spawn(run_reader(
        server.clone(),
        ws_rx,
        out_tx,
        player_id.clone(),
    ));

    // Whichever side finishes first ends the session.
    tokio::select! {
        _ = &mut reader => writer.abort(),
        _ = &mut writer => reader.abort(),
    }

    server.disconnect(&player_id, "session_closed");
    debug!(player = %player_id, "session ended");
}

/// Read loop: decode, dispatch, queue the immediate replies.
async fn run_reader(
    server: SharedServer,
    mut ws_rx: SplitStream<WebSocket>,
    out_tx: mpsc::Sender<String>,
    player_id: String,
) {
    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let envelope = match decode_client(&text) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(player = %player_id, %err, "dropping malformed message");
                        continue;
                    }
                };
                let replies: Vec<ServerBody> =
                    server.handle_client_message(&player_id, envelope);
                for reply in &replies {
                    if out_tx.send(encode_server(reply)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Close(_)) => return,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {
                warn!(player = %player_id, "ignoring binary frame");
            }
            Err(err) => {
                debug!(player = %player_id, %err, "read error");
                return;
            }
        }
    }
}

/// Write loop: drain the outbound channel under the write deadline.
async fn run_writer(
    server: SharedServer,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<String>,
    player_id: String,
) {
    let write_wait = server.config.write_wait;
    while let Some(frame) = out_rx.recv().await {
        let send = ws_tx.send(Message::Text(frame));
        match tokio::time::timeout(write_wait, send).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(player = %player_id, %err, "write error");
                return;
            }
            Err(_) => {
                warn!(player = %player_id, "write deadline expired");
                return;
            }
        }
    }
}
