use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use perf_collector::adb;

use crate::state::AppState;

/// Connected devices. Enumeration trouble yields an empty list, never a 500:
/// a flaky adb server should read as "no devices right now".
pub async fn list_devices(State(state): State<AppState>) -> Json<Value> {
    let devices = match adb::list_devices(&state.inner.config.adb.binary).await {
        Ok(devices) => devices,
        Err(e) => {
            error!(error = %e, "device enumeration failed");
            Vec::new()
        }
    };
    Json(json!({ "devices": devices }))
}
