use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use perf_collector::adb;

use crate::state::AppState;

/// Installed third-party applications on one device, sorted by package.
pub async fn list_apps(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> Json<Value> {
    let apps = match adb::list_packages(&state.inner.config.adb.binary, &serial).await {
        Ok(apps) => apps,
        Err(e) => {
            error!(serial = %serial, error = %e, "package listing failed");
            Vec::new()
        }
    };
    Json(json!({ "apps": apps }))
}
