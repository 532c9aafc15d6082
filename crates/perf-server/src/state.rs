/// Shared application state: the loaded config plus bookkeeping of which
/// device serials currently have a monitoring session attached.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use perf_collector::now_ms;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ServerConfig,
    /// serial → session connect time (epoch ms)
    pub sessions: RwLock<HashMap<String, u64>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a monitoring session. A second client on the same serial
    /// replaces the entry; the old session winds down on its own.
    pub async fn register_session(&self, serial: &str) {
        let mut sessions = self.inner.sessions.write().await;
        if sessions.insert(serial.to_string(), now_ms()).is_some() {
            warn!(serial = %serial, "replacing existing monitoring session");
        }
    }

    pub async fn unregister_session(&self, serial: &str) {
        self.inner.sessions.write().await.remove(serial);
    }
}
