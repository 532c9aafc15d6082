/// Streaming device-log classifier.
///
/// One long-lived `logcat -v threadtime *:V` stream per session. Each line is
/// leveled, crash-marked, and attributed to the target application, by PID
/// once the metrics loop has populated the session's PID set, by package
/// substring before that. Only errors and crash lines survive the filter.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, info};

use perf_protocol::events::{Event, LogEvent, LogLevel};

use crate::now_ms;
use crate::session::Session;
use crate::shell::{ShellChannel, ShellError};

/// Device-side log tail command.
pub const LOGCAT_ARGV: [&str; 4] = ["logcat", "-v", "threadtime", "*:V"];

/// Any of these in a line marks a crash regardless of level.
const CRASH_MARKERS: [&str; 3] = ["FATAL EXCEPTION", "ANR in", "AndroidRuntime"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub level: LogLevel,
    pub is_crash: bool,
}

/// Classify one threadtime line against the current target and PID set.
/// None means the line is filtered out.
///
/// Threadtime layout: `date time PID TID LEVEL TAG message...`. Lines with
/// fewer than five tokens default to info (and are therefore dropped unless
/// they carry a crash marker).
pub fn classify_line(
    line: &str,
    target: Option<&str>,
    pids: &HashSet<String>,
) -> Option<Classified> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let level = if parts.len() >= 5 {
        LogLevel::from_threadtime(parts[4])
    } else {
        LogLevel::Info
    };
    let is_crash = CRASH_MARKERS.iter().any(|m| line.contains(m));

    if level != LogLevel::Error && !is_crash {
        return None;
    }

    if let Some(package) = target {
        if !pids.is_empty() {
            let line_pid = parts
                .get(2)
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
            if let Some(pid) = line_pid {
                // Crashes that name the package outlive their process's PID.
                if !pids.contains(*pid) && !(is_crash && line.contains(package)) {
                    return None;
                }
            }
        } else if !line.contains(package) {
            // No PIDs yet (warm-up or discovery failure): strict text filter
            // to keep system noise out.
            return None;
        }
    }

    Some(Classified { level, is_crash })
}

/// Run the log stream until EOF or cancellation of the surrounding task.
/// The buffer clear is best-effort; a failing clear never blocks the stream.
pub async fn run<S: ShellChannel>(
    shell: &S,
    session: &Session,
    sink: &mpsc::Sender<Event>,
) -> Result<(), ShellError> {
    if let Err(e) = shell.run("logcat -c").await {
        debug!(serial = %session.serial(), error = %e, "logcat buffer clear failed");
    }

    let mut stream = shell.stream(&LOGCAT_ARGV).await?;
    info!(serial = %session.serial(), "logcat monitoring started");

    while session.is_running() {
        let Some(line) = stream.next_line().await else {
            // EOF: device gone or logcat died. The next session restarts it.
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let target = session.target().await;
        let pids = session.pids().await;
        let Some(classified) = classify_line(line, target.as_deref(), &pids) else {
            continue;
        };

        let event = Event::Log(LogEvent {
            timestamp: now_ms(),
            level: classified.level,
            message: line.to_string(),
            is_crash: classified.is_crash,
        });
        if sink.send(event).await.is_err() {
            break;
        }
    }

    info!(serial = %session.serial(), "logcat monitoring ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERROR_LINE: &str =
        "02-09 14:54:50.447 18791 19854 E PreloadLog: failed to load resource";
    const INFO_LINE: &str = "02-09 14:54:50.447 18791 19854 I ActivityManager: displayed";
    const CRASH_LINE: &str =
        "02-09 14:54:51.000  1234  1234 E AndroidRuntime: FATAL EXCEPTION: main";

    fn pids(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_errors_and_crashes_survive() {
        assert!(classify_line(ERROR_LINE, None, &HashSet::new()).is_some());
        assert!(classify_line(INFO_LINE, None, &HashSet::new()).is_none());

        let warn_crash = "02-09 14:54:51.000 100 100 W ActivityManager: ANR in com.example.app";
        let c = classify_line(warn_crash, None, &HashSet::new()).unwrap();
        assert_eq!(c.level, LogLevel::Warn);
        assert!(c.is_crash);
    }

    #[test]
    fn short_lines_default_to_info_and_drop() {
        assert!(classify_line("E short", None, &HashSet::new()).is_none());
    }

    #[test]
    fn pid_attribution_keeps_matching_lines_only() {
        let known = pids(&["18791"]);
        assert!(classify_line(ERROR_LINE, Some("com.example.app"), &known).is_some());

        let other = pids(&["99999"]);
        assert!(classify_line(ERROR_LINE, Some("com.example.app"), &other).is_none());
    }

    #[test]
    fn crash_naming_the_package_bypasses_pid_filter() {
        let line = "02-09 14:54:51.000  1234  1234 E AndroidRuntime: \
                    FATAL EXCEPTION in com.example.app";
        let other = pids(&["99999"]);
        assert!(classify_line(line, Some("com.example.app"), &other).is_some());
        assert!(classify_line(CRASH_LINE, Some("com.example.app"), &other).is_none());
    }

    #[test]
    fn empty_pid_set_falls_back_to_substring_filter() {
        let none = HashSet::new();
        assert!(classify_line(ERROR_LINE, Some("com.example.app"), &none).is_none());

        let named = "02-09 14:54:50.447 18791 19854 E com.example.app: boom";
        assert!(classify_line(named, Some("com.example.app"), &none).is_some());
    }

    #[test]
    fn non_decimal_pid_token_passes_the_pid_filter() {
        // Malformed threadtime line whose third token is not a PID: kept, the
        // level filter already passed and attribution has nothing to go on.
        let line = "-- beginning of crash E oops FATAL EXCEPTION";
        assert!(classify_line(line, Some("com.example.app"), &pids(&["1"])).is_some());
    }
}
