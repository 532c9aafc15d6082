/// Frame timing from the compositor's per-layer latency ring buffer.
///
/// The engine discovers which compositor layer is actually receiving frames
/// for the target package (there are usually several stale candidates), polls
/// its latency dump every tick, and turns the present timestamps into FPS,
/// jank count and stutter percent. The ring buffer keeps old frames around,
/// so an unchanged newest timestamp means the layer is idle, and a layer
/// idle for too long is assumed wrong and rescanned.

use tracing::{debug, info, warn};

use perf_protocol::DEFAULT_REFRESH_PERIOD_NS;

use crate::round1;
use crate::shell::{ShellChannel, ShellError};

/// Sentinel present-time for a frame the compositor has not presented yet.
pub const PENDING_FENCE: i64 = i64::MAX;

const ONE_SECOND_NS: i64 = 1_000_000_000;

/// Layer scan probes at most this many candidates per rescan.
const MAX_LAYER_PROBES: usize = 10;

/// Consecutive idle ticks before the cached layer is assumed wrong.
const IDLE_TICKS_BEFORE_RESCAN: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub fps: u32,
    pub jank: u32,
    /// Percent, one decimal, 0-100
    pub stutter: f64,
}

/// A parsed `--latency` dump: the refresh period line plus the usable
/// present timestamps, in ring-buffer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyDump {
    pub refresh_period_ns: i64,
    pub present_times: Vec<i64>,
}

/// Parse a latency dump. None when the dump is too short to mean anything
/// (dead or unknown layer), which tells the caller to drop its cached layer.
pub fn parse_latency_dump(raw: &str) -> Option<LatencyDump> {
    let lines: Vec<&str> = raw.trim().lines().collect();
    if lines.len() < 2 {
        return None;
    }

    let refresh_period_ns = lines[0]
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|&r| r > 0)
        .unwrap_or(DEFAULT_REFRESH_PERIOD_NS);

    let mut present_times = Vec::new();
    for line in &lines[1..] {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            continue;
        }
        if let Ok(t) = parts[2].parse::<i64>() {
            // 0 = never submitted, MAX = still pending
            if t > 0 && t < PENDING_FENCE {
                present_times.push(t);
            }
        }
    }

    Some(LatencyDump {
        refresh_period_ns,
        present_times,
    })
}

/// The maximal contiguous suffix of `valid` within one second of its newest
/// timestamp: the frames that count toward this tick's FPS.
pub fn one_second_window(valid: &[i64]) -> &[i64] {
    let Some(&last) = valid.last() else {
        return valid;
    };
    let start = valid
        .iter()
        .rposition(|&t| last - t >= ONE_SECOND_NS)
        .map(|i| i + 1)
        .unwrap_or(0);
    &valid[start..]
}

/// Jank and stutter over a window of present times.
///
/// A frame is janky past two refresh periods; everything over one period
/// accumulates into the stutter numerator.
pub fn window_stats(window: &[i64], refresh_period_ns: i64) -> FrameStats {
    let jank_threshold = refresh_period_ns * 2;

    let mut jank = 0u32;
    let mut excess = 0i64;
    let mut total_duration = 0i64;

    for pair in window.windows(2) {
        let duration = pair[1] - pair[0];
        total_duration += duration;
        if duration > jank_threshold {
            jank += 1;
        }
        if duration > refresh_period_ns {
            excess += duration - refresh_period_ns;
        }
    }

    let stutter = if total_duration > 0 {
        round1((excess as f64 / total_duration as f64 * 100.0).min(100.0))
    } else {
        0.0
    };

    FrameStats {
        fps: window.len() as u32,
        jank,
        stutter,
    }
}

/// Candidate layer names for a package from `--list` output: cleaned,
/// filtered of decorations, main-window lookalikes sorted first.
pub fn layer_candidates(list_output: &str, package: &str) -> Vec<String> {
    let mut candidates: Vec<String> = list_output
        .lines()
        .filter(|line| line.contains(package))
        .map(clean_layer_name)
        .filter(|name| !name.contains("Splash Screen") && !name.starts_with("Background for"))
        .collect();

    // SurfaceView and activity-path layers are the likely render targets.
    candidates.sort_by_key(|c| !(c.contains("SurfaceView") || c.contains('/')));
    candidates
}

/// Unwrap `RequestedLayerState{...}` decorations, preferring the `#`-tagged
/// token inside; plain lines pass through trimmed.
fn clean_layer_name(line: &str) -> String {
    let line = line.trim();
    if let Some(start) = line.find("RequestedLayerState{") {
        let inner_start = start + "RequestedLayerState{".len();
        if let Some(end) = line[inner_start..].find('}') {
            let inner = &line[inner_start..inner_start + end];
            for token in inner.split_whitespace() {
                if token.contains('#') {
                    return token.to_string();
                }
            }
            return inner.to_string();
        }
    }
    line.to_string()
}

/// Newest timestamp in a probe dump (`--latency | tail -n 5`). Pending rows
/// fall back to their vsync column so a layer mid-frame still ranks newest.
/// None disqualifies the candidate (short dump or malformed row).
pub fn latest_probe_timestamp(tail_output: &str) -> Option<i64> {
    let lines: Vec<&str> = tail_output.trim().lines().collect();
    if lines.len() < 2 {
        return None;
    }

    let mut last = 0i64;
    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            continue;
        }
        let vsync = parts[1].parse::<i64>().ok()?;
        let present = parts[2].parse::<i64>().ok()?;
        let ts = if present == PENDING_FENCE { vsync } else { present };
        if ts > last {
            last = ts;
        }
    }
    Some(last)
}

/// Per-run frame-timing state: the cached layer, the staleness watchdog.
pub struct FrameEngine {
    layer: Option<String>,
    last_seen_frame_time: Option<i64>,
    zero_fps_streak: u32,
}

impl FrameEngine {
    pub fn new() -> Self {
        Self {
            layer: None,
            last_seen_frame_time: None,
            zero_fps_streak: 0,
        }
    }

    pub fn cached_layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    /// One frame-timing tick. Anything going wrong short of a lost transport
    /// invalidates the cached layer and reports zeros.
    pub async fn tick<S: ShellChannel>(
        &mut self,
        shell: &S,
        package: &str,
    ) -> Result<FrameStats, ShellError> {
        match self.tick_inner(shell, package).await {
            Ok(stats) => Ok(stats),
            Err(e) if e.is_transport_lost() => Err(e),
            Err(e) => {
                debug!(error = %e, "frame tick failed, dropping cached layer");
                self.layer = None;
                Ok(FrameStats::default())
            }
        }
    }

    async fn tick_inner<S: ShellChannel>(
        &mut self,
        shell: &S,
        package: &str,
    ) -> Result<FrameStats, ShellError> {
        // Rescan when there is no cached layer or the target changed.
        if self.layer.as_ref().map_or(true, |l| !l.contains(package)) {
            self.layer = self.scan_active_layer(shell, package).await?;
        }
        let Some(layer) = self.layer.clone() else {
            return Ok(FrameStats::default());
        };

        let raw = shell
            .run(&format!("dumpsys SurfaceFlinger --latency '{layer}'"))
            .await?;

        let Some(dump) = parse_latency_dump(&raw) else {
            // Layer went away; rescan next tick.
            self.layer = None;
            return Ok(FrameStats::default());
        };
        // Only pending frames: rendering may just be starting.
        let Some(&last) = dump.present_times.last() else {
            return Ok(FrameStats::default());
        };
        if self.last_seen_frame_time == Some(last) {
            // Ring buffer unchanged: the layer is idle. Old frames must not
            // be recounted, and a long idle streak means the wrong layer.
            self.zero_fps_streak += 1;
            if self.zero_fps_streak >= IDLE_TICKS_BEFORE_RESCAN {
                warn!(
                    layer = %layer,
                    ticks = self.zero_fps_streak,
                    "no new frames, resetting cached layer"
                );
                self.layer = None;
                self.zero_fps_streak = 0;
            }
            return Ok(FrameStats::default());
        }
        self.zero_fps_streak = 0;
        self.last_seen_frame_time = Some(last);

        let window = one_second_window(&dump.present_times);
        Ok(window_stats(window, dump.refresh_period_ns))
    }

    async fn scan_active_layer<S: ShellChannel>(
        &self,
        shell: &S,
        package: &str,
    ) -> Result<Option<String>, ShellError> {
        let list = shell.run("dumpsys SurfaceFlinger --list").await?;
        let candidates = layer_candidates(&list, package);

        let mut best: Option<(String, i64)> = None;
        for layer in candidates.iter().take(MAX_LAYER_PROBES) {
            let cmd = format!("dumpsys SurfaceFlinger --latency '{layer}' | tail -n 5");
            let out = match shell.run(&cmd).await {
                Ok(out) => out,
                Err(e) if e.is_transport_lost() => return Err(e),
                Err(_) => continue,
            };
            let Some(ts) = latest_probe_timestamp(&out) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, newest)| ts > *newest) {
                best = Some((layer.clone(), ts));
            }
        }

        if let Some((layer, ts)) = &best {
            info!(layer = %layer, timestamp = ts, "selected active layer");
        }
        Ok(best.map(|(layer, _)| layer))
    }
}

impl Default for FrameEngine {
    fn default() -> Self {
        Self::new()
    }
}
