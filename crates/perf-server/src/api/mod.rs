pub mod apps;
pub mod devices;
pub mod records;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::{RECORD_MOUNT, SCREENSHOT_MOUNT};
use crate::state::AppState;
use crate::websocket;

pub fn build_router(state: AppState) -> Router {
    let storage = &state.inner.config.storage;

    Router::new()
        .route("/api/devices", get(devices::list_devices))
        .route("/api/apps/:serial", get(apps::list_apps))
        .route("/api/records/:serial", get(records::list_records))
        // The bidirectional monitoring session
        .route("/ws/monitor/:serial", get(websocket::ws_monitor_handler))
        // Artifact mounts (screenshots, recorded CSVs)
        .nest_service(SCREENSHOT_MOUNT, ServeDir::new(&storage.screenshot_dir))
        .nest_service(RECORD_MOUNT, ServeDir::new(&storage.record_dir))
        // Browser client is served separately during development
        .layer(CorsLayer::permissive())
        .with_state(state)
}
