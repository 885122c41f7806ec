// Local view server: HTTP + WebSocket routes for browser renderers

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::view::ViewModel;

pub type ViewReceiver = watch::Receiver<Option<Arc<ViewModel>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) view_rx: ViewReceiver,
    pub(crate) ws_view_connections: Arc<AtomicUsize>,
}

pub fn app(view_rx: ViewReceiver, ws_view_connections: Arc<AtomicUsize>) -> Router {
    let state = AppState {
        view_rx,
        ws_view_connections,
    };
    Router::new()
        .route("/", get(|| async { "pulseboard dashboard client" })) // GET /
        .route("/health", get(http::health_handler)) // GET /health
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/view", get(http::view_handler)) // GET /api/view
        .route("/ws/view", get(ws::ws_view)) // WS /ws/view
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
