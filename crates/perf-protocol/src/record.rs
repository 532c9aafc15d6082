/// The persisted session record: one CSV row per monitor tick, fourteen
/// columns in fixed order. The header and row formatting live here so the
/// writer and any reader agree on the layout.

use crate::events::Sample;

pub const RECORD_COLUMNS: usize = 14;

/// Column headers, in the order rows are written.
pub const RECORD_HEADER: [&str; RECORD_COLUMNS] = [
    "timestamp",
    "package",
    "cpu(%)",
    "memory(MB)",
    "fps",
    "jank",
    "stutter(%)",
    "gpu(%)",
    "battery.level",
    "battery.voltage(mV)",
    "battery.temp(C)",
    "battery.current(mA)",
    "network.rx(KB/s)",
    "network.tx(KB/s)",
];

/// Format a monitor sample as a record row.
pub fn record_row(sample: &Sample) -> [String; RECORD_COLUMNS] {
    [
        sample.timestamp.to_string(),
        sample.package.clone().unwrap_or_default(),
        sample.cpu.to_string(),
        sample.memory.to_string(),
        sample.fps.to_string(),
        sample.jank.to_string(),
        sample.stutter.to_string(),
        sample.gpu.to_string(),
        sample.battery.level.to_string(),
        sample.battery.voltage.to_string(),
        sample.battery.temp.to_string(),
        sample.battery.current.to_string(),
        sample.network.rx.to_string(),
        sample.network.tx.to_string(),
    ]
}
