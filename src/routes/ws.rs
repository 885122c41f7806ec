// WebSocket view stream: pushes every new view model to connected renderers

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, timeout};

use super::{AppState, ViewReceiver};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_view connection count on drop (connect = +1, drop = -1).
struct WsViewGuard(Arc<AtomicUsize>);

impl Drop for WsViewGuard {
    fn drop(&mut self) {
        let remaining = self.0.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        tracing::info!(view_clients = remaining, "Client left view stream");
    }
}

pub(super) async fn ws_view(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.view_rx.clone();
    let conn_count = state.ws_view_connections.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_view(socket, rx, conn_count).await {
            tracing::info!("View stream error: {}", e);
        }
    })
}

async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}

/// Sends the current view (if any) right away, then each new one. Intermediate views
/// a slow client misses are skipped; it always gets the latest.
async fn stream_view(
    mut socket: WebSocket,
    mut rx: ViewReceiver,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    let view_clients = conn_count.fetch_add(1, Ordering::Relaxed) + 1;
    let _guard = WsViewGuard(conn_count);
    tracing::info!(view_clients, "Client connected to view stream");

    let initial = rx.borrow_and_update().clone();
    if let Some(view) = initial {
        let json = serde_json::to_string(view.as_ref())?;
        if !send_text(&mut socket, json).await {
            return Ok(());
        }
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = rx.borrow_and_update().clone();
                if let Some(view) = latest {
                    let json = serde_json::to_string(view.as_ref())?;
                    if !send_text(&mut socket, json).await {
                        break;
                    }
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
    Ok(())
}
