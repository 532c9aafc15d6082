/// Wire payloads pushed to a monitoring session.
/// Every event a device session produces is one of three shapes: a monitor
/// sample (1 Hz metrics tick), a screenshot notification, or a filtered
/// device-log line. The JSON `type` tag is what the browser client switches on.

use serde::{Deserialize, Serialize};

/// One metrics tick for the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch milliseconds at sampling time
    pub timestamp: u64,
    /// Target package, None until foreground discovery succeeds
    pub package: Option<String>,
    /// Sum of per-PID %CPU; may exceed 100 on multi-core
    pub cpu: f64,
    /// Total PSS in MB
    pub memory: f64,
    pub memory_detail: MemoryDetail,
    pub fps: u32,
    pub jank: u32,
    /// Excess frame time over the window, percent, one decimal
    pub stutter: f64,
    pub gpu: f64,
    pub battery: BatteryInfo,
    pub network: NetworkRates,
}

impl Sample {
    /// A sample with every metric at its neutral value.
    pub fn empty(timestamp: u64, package: Option<String>) -> Self {
        Self {
            timestamp,
            package,
            cpu: 0.0,
            memory: 0.0,
            memory_detail: MemoryDetail::default(),
            fps: 0,
            jank: 0,
            stutter: 0.0,
            gpu: 0.0,
            battery: BatteryInfo::default(),
            network: NetworkRates::default(),
        }
    }
}

/// PSS decomposition in MB, one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryDetail {
    pub total: f64,
    pub java: f64,
    pub native: f64,
    pub graphics: f64,
    pub code: f64,
    /// stack + private other + system
    pub other: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryInfo {
    /// Charge percent 0-100
    pub level: i32,
    /// Millivolts
    pub voltage: i32,
    /// °C (the device reports tenths; converted at parse time)
    pub temp: f64,
    /// Milliamperes, absolute value (discharge sign differs by vendor)
    pub current: i64,
}

/// Per-direction throughput in KB/s, one decimal, never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkRates {
    pub rx: f64,
    pub tx: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotEvent {
    pub timestamp: u64,
    /// `/<mount>/<serial>/<epoch_ms>.jpg`; the mount prefix is server-configured
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Verbose,
}

impl LogLevel {
    /// Map a threadtime level token to a level. Unknown tokens read as Info,
    /// matching the classifier's default for malformed lines.
    pub fn from_threadtime(token: &str) -> Self {
        match token {
            "E" => Self::Error,
            "W" => Self::Warn,
            "D" => Self::Debug,
            "V" => Self::Verbose,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: u64,
    pub level: LogLevel,
    /// The raw device log line, untouched
    pub message: String,
    pub is_crash: bool,
}

/// The session event union. Internally tagged so every payload, including the
/// monitor sample, carries an explicit `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Monitor(Sample),
    Screenshot(ScreenshotEvent),
    Log(LogEvent),
}

impl Event {
    pub fn timestamp(&self) -> u64 {
        match self {
            Event::Monitor(s) => s.timestamp,
            Event::Screenshot(s) => s.timestamp,
            Event::Log(l) => l.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_event_is_tagged() {
        let event = Event::Monitor(Sample::empty(1234, Some("com.example.app".into())));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "monitor");
        assert_eq!(json["timestamp"], 1234);
        assert_eq!(json["package"], "com.example.app");
        assert_eq!(json["battery"]["level"], 0);
    }

    #[test]
    fn log_level_wire_names_are_lowercase() {
        let event = Event::Log(LogEvent {
            timestamp: 1,
            level: LogLevel::Error,
            message: "FATAL EXCEPTION: main".into(),
            is_crash: true,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["level"], "error");
        assert_eq!(json["is_crash"], true);
    }

    #[test]
    fn threadtime_level_mapping() {
        assert_eq!(LogLevel::from_threadtime("E"), LogLevel::Error);
        assert_eq!(LogLevel::from_threadtime("W"), LogLevel::Warn);
        assert_eq!(LogLevel::from_threadtime("D"), LogLevel::Debug);
        assert_eq!(LogLevel::from_threadtime("I"), LogLevel::Info);
        assert_eq!(LogLevel::from_threadtime("V"), LogLevel::Verbose);
        assert_eq!(LogLevel::from_threadtime("F"), LogLevel::Info);
    }
}
