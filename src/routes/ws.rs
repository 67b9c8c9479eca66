// WebSocket marker stream: current view on connect, then one message per new snapshot

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::view::MapView;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_markers(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_markers(socket, state).await {
            tracing::info!("Marker stream error: {}", e);
        }
    })
}

/// Sends `msg`; `false` when the client is gone or too slow.
async fn send_bounded(socket: &mut WebSocket, msg: Message) -> bool {
    matches!(timeout(WS_SEND_TIMEOUT, socket.send(msg)).await, Ok(Ok(())))
}

async fn send_view(socket: &mut WebSocket, view: &MapView) -> anyhow::Result<bool> {
    let json = serde_json::to_string(view)?;
    Ok(send_bounded(socket, Message::Text(json.into())).await)
}

async fn stream_markers(mut socket: WebSocket, state: AppState) -> anyhow::Result<()> {
    tracing::info!("Client connected to marker stream");
    let mut rx = state.snapshots.clone();
    rx.mark_unchanged();

    let mut last_sent = state.map_view();
    if !send_view(&mut socket, &last_sent).await? {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    // Refresh loop is gone; nothing more will be published.
                    break;
                }
                let view = state.map_view();
                if Arc::ptr_eq(&view, &last_sent) {
                    continue;
                }
                if !send_view(&mut socket, &view).await? {
                    break;
                }
                last_sent = view;
            }
            _ = ping_interval.tick() => {
                if !send_bounded(&mut socket, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    Ok(())
}
