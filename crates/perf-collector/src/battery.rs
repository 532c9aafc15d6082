/// Battery sampling: `dumpsys battery` for level/voltage/temperature, plus a
/// best-effort instantaneous current read from whichever power-supply sysfs
/// node the vendor exposes.

use perf_protocol::events::BatteryInfo;

use crate::shell::{ShellChannel, ShellError};

/// Vendor sysfs nodes for instantaneous current, probed in order.
pub const CURRENT_NOW_PATHS: [&str; 3] = [
    "/sys/class/power_supply/battery/current_now",
    "/sys/class/power_supply/bms/current_now",
    "/sys/class/power_supply/main/current_now",
];

/// Level, voltage (mV) and temperature (°C) from a `dumpsys battery` dump.
/// Current stays zero; it comes from sysfs.
pub fn parse_battery_dump(output: &str) -> BatteryInfo {
    let mut info = BatteryInfo::default();
    for line in output.lines() {
        let line = line.trim();
        let int_after = |l: &str| l.split(':').nth(1).and_then(|v| v.trim().parse::<i32>().ok());
        if line.starts_with("level:") {
            if let Some(v) = int_after(line) {
                info.level = v;
            }
        } else if line.starts_with("voltage:") {
            if let Some(v) = int_after(line) {
                info.voltage = v;
            }
        } else if line.starts_with("temperature:") {
            if let Some(v) = int_after(line) {
                // Reported in tenths of a degree.
                info.temp = v as f64 / 10.0;
            }
        }
    }
    info
}

/// Signed microamperes → absolute milliamperes. None when the node's content
/// is not a plain signed integer.
pub fn parse_current_now(content: &str) -> Option<i64> {
    let content = content.trim();
    let digits = content.strip_prefix('-').unwrap_or(content);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    content.parse::<i64>().ok().map(|ua| ua.abs() / 1000)
}

/// One battery tick. Dump trouble degrades to zeros, a missing current node
/// leaves current at zero; only a lost transport propagates.
pub async fn sample<S: ShellChannel>(shell: &S) -> Result<BatteryInfo, ShellError> {
    let mut info = match shell.run("dumpsys battery").await {
        Ok(out) => parse_battery_dump(&out),
        Err(e) if e.is_transport_lost() => return Err(e),
        Err(_) => return Ok(BatteryInfo::default()),
    };

    for path in CURRENT_NOW_PATHS {
        match shell.run(&format!("cat {path}")).await {
            Ok(out) => {
                if let Some(ma) = parse_current_now(&out) {
                    info.current = ma;
                    break;
                }
            }
            Err(e) if e.is_transport_lost() => return Err(e),
            Err(_) => continue,
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_parses_level_voltage_and_tenths_temperature() {
        let out = "\
Current Battery Service state:
  AC powered: false
  USB powered: true
  level: 81
  scale: 100
  voltage: 4102
  temperature: 315
  technology: Li-ion
";
        let info = parse_battery_dump(out);
        assert_eq!(info.level, 81);
        assert_eq!(info.voltage, 4102);
        assert_eq!(info.temp, 31.5);
        assert_eq!(info.current, 0);
    }

    #[test]
    fn current_now_is_absolute_milliamps() {
        assert_eq!(parse_current_now("-312000\n"), Some(312));
        assert_eq!(parse_current_now("1500999"), Some(1500));
        assert_eq!(parse_current_now(""), None);
        assert_eq!(parse_current_now("garbage"), None);
        assert_eq!(parse_current_now("-"), None);
    }
}
