use std::time::UNIX_EPOCH;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::config::RECORD_MOUNT;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct RecordFile {
    name: String,
    size: u64,
    mtime: u64,
    url: String,
}

/// Recorded CSV files for one device, newest first.
pub async fn list_records(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> Json<Value> {
    let dir = state.inner.config.storage.record_dir.join(&serial);
    if !dir.exists() {
        return Json(json!({ "files": [] }));
    }

    let mut files = Vec::new();
    match tokio::fs::read_dir(&dir).await {
        Ok(mut entries) => {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.ends_with(".csv") {
                    continue;
                }
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                files.push(RecordFile {
                    url: format!("{RECORD_MOUNT}/{serial}/{name}"),
                    size: meta.len(),
                    mtime,
                    name,
                });
            }
        }
        Err(e) => {
            error!(serial = %serial, error = %e, "record listing failed");
        }
    }

    files.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    Json(json!({ "files": files }))
}
