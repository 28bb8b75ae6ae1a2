// WebSocket /ws/live: status greeting, then one message per latest-refresh

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::LiveUpdate;
use crate::sync::SyncEngine;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_live(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = engine.subscribe();
        if let Err(e) = stream_live(socket, &mut rx, engine).await {
            tracing::info!("Live stream error: {}", e);
        }
    })
}

/// Sends `text`; false when the client is gone or too slow.
async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    matches!(
        timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(text.into()))).await,
        Ok(Ok(()))
    )
}

async fn stream_live(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<LiveUpdate>,
    engine: Arc<SyncEngine>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to live stream");

    let view = engine.view().await;
    let welcome = serde_json::json!({
        "type": "status",
        "isOnline": view.is_online,
        "isLoading": view.is_loading,
        "current": view.current_reading,
    });
    if !send_text(&mut socket, serde_json::to_string(&welcome)?).await {
        return Ok(());
    }

    let mut ping_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + WS_PING_INTERVAL, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        if !send_text(&mut socket, serde_json::to_string(&update)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/live client lagged, skipped {} updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    tracing::info!("Client disconnected from live stream");
    Ok(())
}
