// HTTP + WebSocket routes over the sync engine's read-only views

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::sync::SyncEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<SyncEngine>,
}

pub fn app(engine: Arc<SyncEngine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/", get(|| async { "meterwatch: energy meter sync service" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/current", get(http::current_handler)) // GET /api/current
        .route("/api/readings", get(http::readings_handler)) // GET /api/readings?view=&search=...
        .route("/api/analytics", get(http::analytics_handler)) // GET /api/analytics?view=&search=...
        .route("/api/historical/{date}", get(http::historical_handler)) // GET /api/historical/2024-05-01
        .route("/api/refresh", post(http::refresh_handler)) // POST /api/refresh
        .route("/ws/live", get(ws::ws_live)) // WS /ws/live
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
