/// adb-backed shell transport plus host-side device enumeration.
///
/// Every operation shells out to the host `adb` binary; the device handle is
/// just `-s <serial>` addressing, so "reconnecting" is a fresh invocation
/// followed by a liveness probe.

use std::process::Stdio;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::shell::{LineStream, ShellChannel, ShellError};

/// Capacity of the log-line channel between the child reader and the classifier.
const STREAM_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct AdbShell {
    adb: String,
    serial: String,
}

impl AdbShell {
    pub fn new(adb: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            adb: adb.into(),
            serial: serial.into(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    async fn output_of(&self, args: &[&str]) -> Result<(Vec<u8>, Vec<u8>, bool), ShellError> {
        let out = Command::new(&self.adb)
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShellError::Command(format!("failed to spawn {}: {e}", self.adb)))?;
        Ok((out.stdout, out.stderr, out.status.success()))
    }
}

impl ShellChannel for AdbShell {
    async fn run(&self, cmd: &str) -> Result<String, ShellError> {
        let (stdout, stderr, ok) = self.output_of(&["shell", cmd]).await?;
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        if ok {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&stderr);
        Err(ShellError::from_output(
            format!("{stdout}{stderr}").trim().to_string(),
        ))
    }

    async fn stream(&self, argv: &[&str]) -> Result<LineStream, ShellError> {
        let mut child = Command::new(&self.adb)
            .arg("-s")
            .arg(&self.serial)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShellError::Command(format!("failed to spawn {}: {e}", self.adb)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::Command("child stdout not captured".into()))?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let serial = self.serial.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            // Consumer dropped the stream: cancel the child.
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(serial = %serial, error = %e, "log stream read error");
                        break;
                    }
                }
            }
            let _ = child.start_kill();
            let _ = child.wait().await;
            debug!(serial = %serial, "log stream child reaped");
        });

        Ok(LineStream::from_receiver(rx))
    }

    async fn screencap(&self) -> Result<Vec<u8>, ShellError> {
        let (stdout, stderr, ok) = self.output_of(&["exec-out", "screencap", "-p"]).await?;
        if ok && !stdout.is_empty() {
            return Ok(stdout);
        }
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr)
        );
        Err(ShellError::from_output(text.trim().to_string()))
    }

    async fn reconnect(&self) -> Result<(), ShellError> {
        // Addressing is stateless, so a fresh handle is just a probe.
        self.run("ls").await.map(|_| ())
    }
}

// ── Host-side enumeration (used by the server boundary, not the loops) ──

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub serial: String,
    pub model: String,
    pub platform: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct AppInfo {
    pub package: String,
    pub name: String,
}

/// Serials reported as `device` by `adb devices`.
pub fn parse_device_serials(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1) // "List of devices attached"
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Third-party packages from `pm list packages -3` output.
pub fn parse_package_list(output: &str) -> Vec<AppInfo> {
    let mut apps: Vec<AppInfo> = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .filter(|pkg| !pkg.is_empty())
        .map(|pkg| AppInfo {
            package: pkg.to_string(),
            name: pkg.to_string(),
        })
        .collect();
    apps.sort();
    apps
}

/// List connected Android devices with a human-readable model name.
/// Enumeration is best-effort: an unreachable device degrades to its serial.
pub async fn list_devices(adb: &str) -> Result<Vec<DeviceInfo>, ShellError> {
    let out = Command::new(adb)
        .arg("devices")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ShellError::Command(format!("failed to spawn {adb}: {e}")))?;
    if !out.status.success() {
        return Err(ShellError::from_output(
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ));
    }

    let listing = String::from_utf8_lossy(&out.stdout);
    let mut devices = Vec::new();
    for serial in parse_device_serials(&listing) {
        let shell = AdbShell::new(adb, &serial);
        let manufacturer = shell
            .run("getprop ro.product.manufacturer")
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let model = shell
            .run("getprop ro.product.model")
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let name = format!("{manufacturer} {model}").trim().to_string();
        devices.push(DeviceInfo {
            model: if name.is_empty() { serial.clone() } else { name },
            serial,
            platform: "android".into(),
            status: "online".into(),
        });
    }
    info!(count = devices.len(), "enumerated adb devices");
    Ok(devices)
}

/// List installed third-party applications on one device.
pub async fn list_packages(adb: &str, serial: &str) -> Result<Vec<AppInfo>, ShellError> {
    let shell = AdbShell::new(adb, serial);
    let out = shell.run("pm list packages -3").await?;
    Ok(parse_package_list(&out))
}
