/// Shared per-device session state.
///
/// Written by the orchestrator (`set_target`, running flag) and the metrics
/// loop (PID refresh), read by the log classifier on every line. The target
/// and PID set are eventually consistent across loops; while the PID set is
/// still empty the classifier falls back to substring attribution.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

pub struct Session {
    serial: String,
    running: AtomicBool,
    target: RwLock<Option<String>>,
    pids: RwLock<HashSet<String>>,
}

impl Session {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            running: AtomicBool::new(false),
            target: RwLock::new(None),
            pids: RwLock::new(HashSet::new()),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Set the running flag, returning the previous value (start/stop are
    /// idempotent off the back of this).
    pub fn set_running(&self, running: bool) -> bool {
        self.running.swap(running, Ordering::SeqCst)
    }

    pub async fn target(&self) -> Option<String> {
        self.target.read().await.clone()
    }

    pub async fn set_target(&self, package: Option<String>) {
        *self.target.write().await = package;
    }

    pub async fn pids(&self) -> HashSet<String> {
        self.pids.read().await.clone()
    }

    pub async fn set_pids(&self, pids: HashSet<String>) {
        *self.pids.write().await = pids;
    }

    pub async fn clear_pids(&self) {
        self.pids.write().await.clear();
    }
}
