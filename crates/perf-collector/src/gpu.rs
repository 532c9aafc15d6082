/// GPU utilization from vendor sysfs nodes.
///
/// Adreno exposes a `<busy> <total>` cycle pair; the Mali and Pixel nodes are
/// a bare 0-100 integer. The first path that parses is cached for the rest of
/// the run, so steady state is a single `cat` per tick.

use tracing::debug;

use crate::round1;
use crate::shell::{ShellChannel, ShellError};

/// Probe order matters: real devices expose exactly one of these.
pub const GPU_SYSFS_PATHS: [&str; 4] = [
    "/sys/class/kgsl/kgsl-3d0/gpubusy",
    "/sys/class/misc/mali0/device/utilization",
    "/sys/kernel/debug/mali0/ctx/utilization_gp_pp",
    "/sys/devices/platform/google,mali/gpu_utilization",
];

/// Interpret a sysfs node's content according to which node it came from.
/// None means the content did not parse (wrong node for this device).
pub fn parse_gpu_sysfs(content: &str, path: &str) -> Option<f64> {
    let content = content.trim();

    if path.contains("kgsl") {
        let parts: Vec<&str> = content.split_whitespace().collect();
        if parts.len() != 2 {
            return None;
        }
        let used = parts[0].parse::<u64>().ok()?;
        let total = parts[1].parse::<u64>().ok()?;
        if total == 0 {
            return Some(0.0);
        }
        return Some(round1((used as f64 / total as f64 * 100.0).min(100.0)));
    }

    if !content.is_empty() && content.bytes().all(|b| b.is_ascii_digit()) {
        return content.parse::<u64>().ok().map(|v| v as f64);
    }
    None
}

/// Stateful GPU sampler, one per collection run.
pub struct GpuSampler {
    cached_path: Option<&'static str>,
}

impl GpuSampler {
    pub fn new() -> Self {
        Self { cached_path: None }
    }

    /// One GPU tick. Unreadable or unparsable nodes degrade to 0.0; only a
    /// lost transport propagates.
    pub async fn sample<S: ShellChannel>(&mut self, shell: &S) -> Result<f64, ShellError> {
        for path in GPU_SYSFS_PATHS {
            if let Some(cached) = self.cached_path {
                if cached != path {
                    continue;
                }
            }

            let out = match shell.run(&format!("cat {path} 2>/dev/null")).await {
                Ok(out) => out,
                Err(e) if e.is_transport_lost() => return Err(e),
                Err(_) => continue,
            };
            if out.trim().is_empty() {
                continue;
            }

            if let Some(val) = parse_gpu_sysfs(&out, path) {
                if self.cached_path.is_none() {
                    debug!(path, "gpu sysfs node selected");
                }
                self.cached_path = Some(path);
                return Ok(val);
            }
        }
        Ok(0.0)
    }
}

impl Default for GpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADRENO: &str = "/sys/class/kgsl/kgsl-3d0/gpubusy";
    const MALI: &str = "/sys/class/misc/mali0/device/utilization";

    #[test]
    fn adreno_busy_ratio() {
        assert_eq!(parse_gpu_sysfs("71894 1209006", ADRENO), Some(5.9));
    }

    #[test]
    fn adreno_idle_counters_are_zero_not_nan() {
        assert_eq!(parse_gpu_sysfs("0 0", ADRENO), Some(0.0));
    }

    #[test]
    fn adreno_ratio_clamps_at_one_hundred() {
        assert_eq!(parse_gpu_sysfs("5000 100", ADRENO), Some(100.0));
    }

    #[test]
    fn mali_bare_integer() {
        assert_eq!(parse_gpu_sysfs("42", MALI), Some(42.0));
    }

    #[test]
    fn garbage_content_does_not_parse() {
        assert_eq!(parse_gpu_sysfs("n/a", MALI), None);
        assert_eq!(parse_gpu_sysfs("1 2 3", ADRENO), None);
        assert_eq!(parse_gpu_sysfs("-5", MALI), None);
    }
}
