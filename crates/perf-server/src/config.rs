/// Server configuration: TOML file with defaulted sections, so a bare
/// `perf-server` run works with no file at all.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// URL prefix screenshots are served under; the collector embeds it in
/// screenshot event URLs.
pub const SCREENSHOT_MOUNT: &str = "/screenshots";

/// URL prefix recorded CSV files are served under.
pub const RECORD_MOUNT: &str = "/records";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub adb: AdbSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default = "default_record_dir")]
    pub record_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            screenshot_dir: default_screenshot_dir(),
            record_dir: default_record_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdbSection {
    /// Path to the adb binary (resolved through PATH by default)
    #[serde(default = "default_adb_binary")]
    pub binary: String,
}

impl Default for AdbSection {
    fn default() -> Self {
        Self {
            binary: default_adb_binary(),
        }
    }
}

fn default_screenshot_dir() -> PathBuf { PathBuf::from("static/screenshots") }
fn default_record_dir() -> PathBuf { PathBuf::from("static/records") }
fn default_adb_binary() -> String { "adb".to_string() }

pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}
