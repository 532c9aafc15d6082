/// Per-device collection core: shell transport, sampling loops, frame-timing
/// engine, and the device-log classifier.
///
/// The entry point is [`Collector`], one per connected device. It owns three
/// cooperating loops (metrics at 1 s, screenshots at 2 s, a streaming log
/// classifier) and pushes every produced [`perf_protocol::events::Event`] into
/// a single mpsc sink supplied by the caller.

pub mod adb;
pub mod battery;
pub mod collector;
pub mod cpu;
pub mod foreground;
pub mod frames;
pub mod gpu;
pub mod logcat;
pub mod meminfo;
pub mod network;
pub mod screenshot;
pub mod session;
pub mod shell;

pub use collector::Collector;
pub use session::Session;
pub use shell::{LineStream, ShellChannel, ShellError};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Round to one decimal, the precision every percent/MB/KB-s metric reports.
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
