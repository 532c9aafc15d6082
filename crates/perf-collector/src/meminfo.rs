/// Memory sampling from `dumpsys meminfo <pkg>`.
///
/// The dump reports KB; everything is converted to MB at one decimal. The
/// `TOTAL` data row must not be confused with the `TOTAL PSS:` summary header,
/// so any line carrying `PSS:` is excluded from the total match.

use perf_protocol::events::MemoryDetail;

use crate::round1;
use crate::shell::{ShellChannel, ShellError};

fn kb_at(parts: &[&str], index: usize) -> u64 {
    parts
        .get(index)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Extract the PSS breakdown from a meminfo dump. Absent or malformed labels
/// read as zero; nothing here can go negative.
pub fn parse_meminfo(output: &str) -> MemoryDetail {
    let mut total_kb = 0u64;
    let mut java_kb = 0u64;
    let mut native_kb = 0u64;
    let mut code_kb = 0u64;
    let mut stack_kb = 0u64;
    let mut graphics_kb = 0u64;
    let mut private_other_kb = 0u64;
    let mut system_kb = 0u64;

    for line in output.lines() {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();

        if line.starts_with("TOTAL") && !line.contains("PSS:") {
            if let Some(v) = parts.get(1).and_then(|v| v.parse::<u64>().ok()) {
                total_kb = v;
            }
        } else if line.contains("Java Heap:") {
            java_kb = kb_at(&parts, 2);
        } else if line.contains("Native Heap:") {
            native_kb = kb_at(&parts, 2);
        } else if line.contains("Code:") {
            code_kb = kb_at(&parts, 1);
        } else if line.contains("Stack:") {
            stack_kb = kb_at(&parts, 1);
        } else if line.contains("Graphics:") {
            graphics_kb = kb_at(&parts, 1);
        } else if line.contains("Private Other:") {
            private_other_kb = kb_at(&parts, 2);
        } else if line.contains("System:") {
            system_kb = kb_at(&parts, 1);
        }
    }

    let mb = |kb: u64| round1(kb as f64 / 1024.0);
    MemoryDetail {
        total: mb(total_kb),
        java: mb(java_kb),
        native: mb(native_kb),
        graphics: mb(graphics_kb),
        code: mb(code_kb),
        other: mb(stack_kb + private_other_kb + system_kb),
    }
}

/// One memory tick. Parse trouble degrades to zeros; only a lost transport
/// propagates.
pub async fn sample<S: ShellChannel>(
    shell: &S,
    package: &str,
) -> Result<MemoryDetail, ShellError> {
    match shell.run(&format!("dumpsys meminfo {package}")).await {
        Ok(out) => Ok(parse_meminfo(&out)),
        Err(e) if e.is_transport_lost() => Err(e),
        Err(_) => Ok(MemoryDetail::default()),
    }
}
