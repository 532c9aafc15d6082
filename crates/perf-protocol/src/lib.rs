pub mod events;
pub mod record;

/// Metrics sampling cadence, one tick per second.
pub const MONITOR_INTERVAL_MS: u64 = 1000;

/// Screenshot cadence. Slower than metrics to keep device impact low.
pub const SCREENSHOT_INTERVAL_MS: u64 = 2000;

/// Display refresh period assumed when the device reports none, in ns (60 Hz).
pub const DEFAULT_REFRESH_PERIOD_NS: i64 = 16_666_666;

/// JPEG quality for screenshot artifacts.
pub const SCREENSHOT_JPEG_QUALITY: u8 = 40;

/// Default server listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
