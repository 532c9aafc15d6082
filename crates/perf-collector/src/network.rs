/// Network throughput for the target application.
///
/// Counter sources are tiered: per-UID `/proc/uid_stat`, then the qtaguid
/// stats table, then whole-device `/proc/net/dev` as the bottom tier for
/// devices that expose neither per-UID node. Rates are deltas against the
/// previous tick, clamped at zero: a counter reset or restart shows as a
/// zero tick, never a negative one.

use tokio::time::Instant;

use perf_protocol::events::NetworkRates;

use crate::round1;
use crate::shell::{ShellChannel, ShellError};

/// Interfaces counted in the whole-device tier.
const COUNTED_IFACES: [&str; 3] = ["wlan", "rmnet", "eth"];

/// App UID out of `dumpsys package <pkg>` output (`userId=10318 ...`).
pub fn parse_uid(output: &str) -> Option<String> {
    let after = output.trim().split("userId=").nth(1)?;
    let uid = after.split_whitespace().next()?;
    if uid.is_empty() {
        None
    } else {
        Some(uid.to_string())
    }
}

/// Tier 1: `/proc/uid_stat/<uid>/{tcp_rcv,tcp_snd}`, both plain integers.
pub fn parse_uid_stat(rcv: &str, snd: &str) -> Option<(u64, u64)> {
    let rx = rcv.trim().parse::<u64>().ok()?;
    let tx = snd.trim().parse::<u64>().ok()?;
    Some((rx, tx))
}

/// Tier 2: qtaguid stats rows whose uid column matches, rx/tx byte columns
/// summed. Any non-empty grep output counts as data, even if no row matches.
pub fn parse_qtaguid(output: &str, uid: &str) -> Option<(u64, u64)> {
    if output.trim().is_empty() {
        return None;
    }
    let mut rx = 0u64;
    let mut tx = 0u64;
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // idx iface acct_tag_hex uid_tag_int cnt_set rx_bytes rx_packets tx_bytes ...
        if parts.len() > 8 && parts[3] == uid {
            rx += parts[5].parse::<u64>().unwrap_or(0);
            tx += parts[7].parse::<u64>().unwrap_or(0);
        }
    }
    Some((rx, tx))
}

/// Tier 3: `/proc/net/dev`, summed across radio/ethernet interfaces.
pub fn parse_net_dev(output: &str) -> Option<(u64, u64)> {
    let mut rx = 0u64;
    let mut tx = 0u64;
    let mut found = false;
    for line in output.lines() {
        if !COUNTED_IFACES.iter().any(|i| line.contains(i)) {
            continue;
        }
        let Some((_, counters)) = line.split_once(':') else {
            continue;
        };
        let parts: Vec<&str> = counters.split_whitespace().collect();
        if parts.len() >= 9 {
            rx += parts[0].parse::<u64>().unwrap_or(0);
            tx += parts[8].parse::<u64>().unwrap_or(0);
            found = true;
        }
    }
    found.then_some((rx, tx))
}

/// Delta-based rate tracker. One per collection run; dropping it drops the
/// baseline, which is exactly what a restart needs.
pub struct NetworkTracker {
    last: Option<(u64, u64, Instant)>,
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Fold this tick's counters into a KB/s rate pair. `None` counters mean
    /// every tier failed: the baseline is dropped so the next success starts
    /// a fresh interval instead of reporting a bogus spike.
    pub fn rate(&mut self, counters: Option<(u64, u64)>) -> NetworkRates {
        self.rate_at(counters, Instant::now())
    }

    fn rate_at(&mut self, counters: Option<(u64, u64)>, now: Instant) -> NetworkRates {
        let Some((rx, tx)) = counters else {
            self.last = None;
            return NetworkRates::default();
        };

        let mut rates = NetworkRates::default();
        if let Some((prev_rx, prev_tx, prev_t)) = self.last {
            let dt = now.duration_since(prev_t).as_secs_f64();
            if dt > 0.0 {
                // saturating_sub: a shrinking counter is a reset, not traffic
                rates.rx = round1(rx.saturating_sub(prev_rx) as f64 / 1024.0 / dt);
                rates.tx = round1(tx.saturating_sub(prev_tx) as f64 / 1024.0 / dt);
            }
        }
        self.last = Some((rx, tx, now));
        rates
    }
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Read this tick's byte counters through the tiers. UID resolution is
/// best-effort; without one, the per-UID tiers are skipped entirely.
pub async fn read_counters<S: ShellChannel>(
    shell: &S,
    package: &str,
) -> Result<Option<(u64, u64)>, ShellError> {
    let uid = match shell
        .run(&format!("dumpsys package {package} | grep userId="))
        .await
    {
        Ok(out) => parse_uid(&out),
        Err(e) if e.is_transport_lost() => return Err(e),
        Err(_) => None,
    };

    if let Some(uid) = uid {
        let rcv = shell.run(&format!("cat /proc/uid_stat/{uid}/tcp_rcv")).await;
        let snd = shell.run(&format!("cat /proc/uid_stat/{uid}/tcp_snd")).await;
        match (rcv, snd) {
            (Ok(rcv), Ok(snd)) => {
                if let Some(counters) = parse_uid_stat(&rcv, &snd) {
                    return Ok(Some(counters));
                }
            }
            (Err(e), _) | (_, Err(e)) if e.is_transport_lost() => return Err(e),
            _ => {}
        }

        match shell
            .run(&format!("cat /proc/net/xt_qtaguid/stats | grep {uid}"))
            .await
        {
            Ok(out) => {
                if let Some(counters) = parse_qtaguid(&out, &uid) {
                    return Ok(Some(counters));
                }
            }
            Err(e) if e.is_transport_lost() => return Err(e),
            Err(_) => {}
        }
    }

    match shell.run("cat /proc/net/dev").await {
        Ok(out) => Ok(parse_net_dev(&out)),
        Err(e) if e.is_transport_lost() => Err(e),
        Err(_) => Ok(None),
    }
}

/// One network tick: counters through the tiers, then the delta rate.
pub async fn sample<S: ShellChannel>(
    shell: &S,
    package: &str,
    tracker: &mut NetworkTracker,
) -> Result<NetworkRates, ShellError> {
    let counters = read_counters(shell, package).await?;
    Ok(tracker.rate(counters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn uid_extraction() {
        let out = "    userId=10318 gids=[3003]\n";
        assert_eq!(parse_uid(out), Some("10318".to_string()));
        assert_eq!(parse_uid("no uid here"), None);
    }

    #[test]
    fn qtaguid_sums_matching_uid_rows_only() {
        let out = "\
2 wlan0 0x0 10318 0 1000 10 2000 20 0 0 0 0 0 0 0 0 0 0 0 0 0
3 wlan0 0x0 10318 1 500 5 250 2 0 0 0 0 0 0 0 0 0 0 0 0 0
4 wlan0 0x0 10999 0 9999 9 9999 9 0 0 0 0 0 0 0 0 0 0 0 0 0
";
        assert_eq!(parse_qtaguid(out, "10318"), Some((1500, 2250)));
    }

    #[test]
    fn qtaguid_nonempty_output_with_no_match_is_zero_data() {
        let out = "4 wlan0 0x0 10999 0 9999 9 9999 9 0 0 0 0 0\n";
        assert_eq!(parse_qtaguid(out, "10318"), Some((0, 0)));
        assert_eq!(parse_qtaguid("", "10318"), None);
    }

    #[test]
    fn net_dev_counts_radio_interfaces_only() {
        let out = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000000  100    0    0    0     0          0         0   1000000  100    0    0    0     0       0          0
 wlan0: 2048     10     0    0    0     0          0         0   1024     5      0    0    0     0       0          0
rmnet0: 4096     20     0    0    0     0          0         0   512      2      0    0    0     0       0          0
";
        assert_eq!(parse_net_dev(out), Some((6144, 1536)));
    }

    #[test]
    fn net_dev_without_radio_interfaces_is_no_data() {
        let out = "    lo: 1000 1 0 0 0 0 0 0 1000 1 0 0 0 0 0 0\n";
        assert_eq!(parse_net_dev(out), None);
    }

    #[test]
    fn rate_is_delta_over_elapsed_time() {
        let mut tracker = NetworkTracker::new();
        let t0 = Instant::now();

        // First observation establishes the baseline: zero rate.
        assert_eq!(tracker.rate_at(Some((10_240, 0)), t0), NetworkRates::default());

        let rates = tracker.rate_at(Some((30_720, 5_120)), t0 + Duration::from_secs(2));
        assert_eq!(rates.rx, 10.0); // 20480 B / 1024 / 2 s
        assert_eq!(rates.tx, 2.5);
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        let mut tracker = NetworkTracker::new();
        let t0 = Instant::now();
        tracker.rate_at(Some((1_000_000, 1_000_000)), t0);
        let rates = tracker.rate_at(Some((100, 200)), t0 + Duration::from_secs(1));
        assert_eq!(rates, NetworkRates::default());
    }

    #[test]
    fn total_failure_drops_the_baseline() {
        let mut tracker = NetworkTracker::new();
        let t0 = Instant::now();
        tracker.rate_at(Some((10_240, 10_240)), t0);
        tracker.rate_at(None, t0 + Duration::from_secs(1));

        // Next success is a fresh baseline, not a delta against stale data.
        let rates = tracker.rate_at(Some((999_999, 999_999)), t0 + Duration::from_secs(2));
        assert_eq!(rates, NetworkRates::default());
    }
}
