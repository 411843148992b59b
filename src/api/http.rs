//! HTTP server setup with Axum
//!
//! Two routers, served on separate listeners: the live feed (websocket) and
//! the read API.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{drivers, telemetry, ReadState};
use super::websocket::{handler::ws_handler, LiveBroadcaster};

fn cors() -> CorsLayer {
    // Allow all origins for browser dashboards
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Router for the live feed listener
pub fn live_router(broadcaster: Arc<LiveBroadcaster>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(cors())
        .with_state(broadcaster)
}

/// Router for the read API listener
pub fn api_router(state: Arc<ReadState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/telemetry/latest/:driver_number",
            get(telemetry::latest_for_driver),
        )
        .route("/api/drivers", get(drivers::list_drivers))
        .layer(cors())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
