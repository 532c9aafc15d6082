/// CPU sampling: PID discovery via `pgrep -f`, then `top -b -n 1 -p` with an
/// anchor-based parse.
///
/// `top` column layout varies across vendor builds, so the parser never trusts
/// fixed indices first. It anchors on the single-character process state and
/// reads the next token as %CPU; two documented fallbacks cover the forks
/// where the anchor drifts. Real devices rely on each tier, so the order is
/// load-bearing.

use std::collections::HashSet;

use crate::session::Session;
use crate::shell::{ShellChannel, ShellError};

/// Single-character process states used as the %CPU column anchor.
const STATE_CHARS: [&str; 6] = ["R", "S", "I", "D", "Z", "T"];

/// Sum of %CPU across all non-header data rows of a `top -b -n 1` block.
pub fn parse_cpu_from_top(output: &str) -> f64 {
    let mut total = 0.0;

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            continue;
        }
        // Header rows: "PID USER PR NI ..."
        if parts.contains(&"PID") && parts.contains(&"USER") {
            continue;
        }

        // Anchor: state char, %CPU in the following token.
        let mut found = false;
        for i in 0..parts.len().saturating_sub(1) {
            if STATE_CHARS.contains(&parts[i]) {
                if let Ok(val) = parts[i + 1].trim_end_matches('%').parse::<f64>() {
                    total += val;
                    found = true;
                    break;
                }
            }
        }

        // Fallback 1: any token written as a percentage.
        if !found {
            for part in &parts {
                if let Some(stripped) = part.strip_suffix('%') {
                    if let Ok(val) = stripped.parse::<f64>() {
                        total += val;
                        found = true;
                        break;
                    }
                }
            }
        }

        // Fallback 2: classic layout, state at index 7 and %CPU at index 8.
        if !found && parts.len() >= 10 && STATE_CHARS.contains(&parts[7]) {
            if let Ok(val) = parts[8].parse::<f64>() {
                total += val;
            }
        }
    }

    total
}

/// Decimal PIDs out of `pgrep -f` output.
pub fn parse_pids(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// One CPU tick: refresh the session's PID set, then sum %CPU over those PIDs.
/// An empty or failed PID lookup zeroes the tick; only a lost transport
/// propagates.
pub async fn sample<S: ShellChannel>(
    shell: &S,
    session: &Session,
    package: &str,
) -> Result<f64, ShellError> {
    let pids = match shell.run(&format!("pgrep -f {package}")).await {
        Ok(out) => parse_pids(&out),
        Err(e) if e.is_transport_lost() => return Err(e),
        Err(_) => HashSet::new(),
    };
    session.set_pids(pids.clone()).await;

    if pids.is_empty() {
        return Ok(0.0);
    }

    let mut sorted: Vec<&String> = pids.iter().collect();
    sorted.sort();
    let pid_csv = sorted
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",");

    match shell.run(&format!("top -b -n 1 -p {pid_csv}")).await {
        Ok(out) if !out.trim().is_empty() => Ok(parse_cpu_from_top(&out)),
        Ok(_) => Ok(0.0),
        Err(e) if e.is_transport_lost() => Err(e),
        Err(_) => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_TOP: &str = "\
Tasks: 1 total,   0 running,   1 sleeping,   0 stopped,   0 zombie
Mem:   5855428k total,  5636040k used,   219388k free,    72844k buffers
Swap:  2097148k total,        0k used,  2097148k free,  2665672k cached
800%cpu  23%user   0%nice  20%sys 757%idle   0%iow   0%irq   0%sirq   0%host
  PID USER         PR  NI VIRT  RES  SHR S[%CPU] %MEM     TIME+ ARGS
12345 u0_a123      20   0 1.2G 123M  80M S 10.5   2.1   0:10.50 com.example.app
";

    #[test]
    fn single_process() {
        assert_eq!(parse_cpu_from_top(STANDARD_TOP), 10.5);
    }

    #[test]
    fn offset_columns_anchor_on_state_char() {
        let output = "\
Tasks: 2 total,   0 running,   2 sleeping,   0 stopped,   0 zombie
  Mem:    15301M total,    15142M used,      159M free,       21M buffers
 Swap:    15301M total,      520M used,    14780M free,     7783M cached
800%cpu  74%user  11%nice 111%sys 589%idle   0%iow  15%irq   0%sirq   0%host
  PID USER         PR  NI VIRT  RES  SHR S[%CPU] %MEM     TIME+ ARGS
13737 u0_a318      10 -10  39G 293M 146M S 25.9   1.9  28:49.74 com.spreadwin.live.pro
13905 u0_a318      20   0  16G  74M  41M S  0.0   0.4   0:18.91 com.spreadwin.live.pro:pushcore
";
        assert_eq!(parse_cpu_from_top(output), 25.9);
    }

    #[test]
    fn multiple_processes_sum() {
        let output = "\
  PID USER         PR  NI VIRT  RES  SHR S[%CPU] %MEM     TIME+ ARGS
13737 u0_a318      10 -10  39G 293M 146M S 25.9   1.9  28:49.74 com.spreadwin.live.pro
13905 u0_a318      20   0  16G  74M  41M S  5.1   0.4   0:18.91 com.spreadwin.live.pro:pushcore
";
        assert_eq!(parse_cpu_from_top(output), 31.0);
    }

    #[test]
    fn percent_suffix_fallback() {
        // No bare state char before the value; %CPU written with a suffix.
        let output = "9001 shell 20 0 1G 50M 30M 12.3% 0.5 0:01.00 com.example.app extra\n";
        assert_eq!(parse_cpu_from_top(output), 12.3);
    }

    #[test]
    fn summary_rows_contribute_nothing() {
        let output = "800%cpu  23%user   0%nice  20%sys 757%idle   0%iow   0%irq   0%sirq   0%host\n";
        assert_eq!(parse_cpu_from_top(output), 0.0);
    }

    #[test]
    fn pgrep_output_keeps_only_decimal_pids() {
        let pids = parse_pids("1234\n5678\n\nbad-pid\n  910 \n");
        assert_eq!(
            pids,
            HashSet::from(["1234".to_string(), "5678".to_string(), "910".to_string()])
        );
    }
}
