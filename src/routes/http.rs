// GET handlers: health, version, current view

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::atomic::Ordering;

use super::AppState;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /health: liveness plus the number of open view streams. Does not reflect the
/// backend connection.
pub(super) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "view_clients": state.ws_view_connections.load(Ordering::Relaxed),
    }))
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/view: latest view model, 503 until the first metrics update arrives.
pub(super) async fn view_handler(State(state): State<AppState>) -> impl IntoResponse {
    let current = state.view_rx.borrow().clone();
    match current {
        Some(view) => (
            StatusCode::OK,
            axum::Json(serde_json::to_value(view.as_ref()).unwrap_or_default()),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({ "error": "no metrics received yet" })),
        ),
    }
}
