/// Device shell transport seam.
///
/// Samplers never touch adb directly; they speak to a [`ShellChannel`], which
/// covers one-shot commands, a long-lived line stream for the device log, raw
/// framebuffer capture, and a reconnect probe. Production uses [`crate::adb::AdbShell`];
/// tests substitute a scripted in-memory channel.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

/// Phrases in adb error output that mean the device itself is gone rather
/// than the command having failed.
const TRANSPORT_LOST_MARKERS: [&str; 2] = ["not found", "offline"];

#[derive(Debug, Error)]
pub enum ShellError {
    /// The device disappeared from the transport. Escalates to a reconnect
    /// cycle in the metrics loop; every other loop just winds down.
    #[error("device transport lost: {0}")]
    TransportLost(String),
    /// The command ran but failed or produced nothing usable. Recoverable:
    /// the affected metric degrades to its neutral value for the tick.
    #[error("shell command failed: {0}")]
    Command(String),
}

impl ShellError {
    /// Classify a failed command by its combined output.
    pub fn from_output(text: impl Into<String>) -> Self {
        let text = text.into();
        if TRANSPORT_LOST_MARKERS.iter().any(|m| text.contains(m)) {
            Self::TransportLost(text)
        } else {
            Self::Command(text)
        }
    }

    pub fn is_transport_lost(&self) -> bool {
        matches!(self, Self::TransportLost(_))
    }
}

/// Lines from a streaming child process (the device log tail).
///
/// Dropping the stream is the cancellation path: the producing task notices
/// the closed channel, terminates the child, and waits for its exit.
pub struct LineStream {
    rx: mpsc::Receiver<String>,
}

impl LineStream {
    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Next decoded line, or None on EOF / child exit.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Command execution against one device.
///
/// The futures are explicitly `Send` so samplers stay spawnable when generic
/// over the channel implementation.
pub trait ShellChannel: Send + Sync + 'static {
    /// Blocking one-shot device shell command; stdout, lossy-decoded.
    fn run(&self, cmd: &str) -> impl Future<Output = Result<String, ShellError>> + Send;

    /// Spawn a host child attached to the device log. `argv` is the
    /// device-side command; the transport supplies device addressing.
    fn stream(&self, argv: &[&str]) -> impl Future<Output = Result<LineStream, ShellError>> + Send;

    /// Raw framebuffer capture (PNG bytes).
    fn screencap(&self) -> impl Future<Output = Result<Vec<u8>, ShellError>> + Send;

    /// Re-establish the device handle and probe liveness.
    fn reconnect(&self) -> impl Future<Output = Result<(), ShellError>> + Send;
}
