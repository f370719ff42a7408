//! `adb` backed device session
//!
//! Every operation spawns the adb client binary; the adb server handles the
//! actual wire protocol to the device.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use super::{DeviceSession, Elevation, RemountStatus, ShellOutput};
use crate::common::config::AdbConfig;
use crate::common::{Error, Result};

/// Device session driving the `adb` command-line client
#[derive(Debug)]
pub struct AdbSession {
    binary: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    serial: Option<String>,
}

impl AdbSession {
    /// Query the adb server and bind to a device.
    ///
    /// Picks `requested` if given and attached, otherwise the first device in
    /// the `device` state. No matching device leaves the session without a
    /// serial; the executor treats that as a bail condition.
    pub async fn connect(config: &AdbConfig, requested: Option<&str>) -> Result<Self> {
        let mut session = Self::detached(config);

        let output = session.adb(&["devices"]).await?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let devices = parse_devices(&listing);
        tracing::debug!("adb devices: {:?}", devices);

        session.serial = select_device(&devices, requested);
        Ok(session)
    }

    /// Session bound to no device, used when the adb server is unreachable
    pub fn detached(config: &AdbConfig) -> Self {
        Self {
            binary: config.resolve_binary(),
            host: config.host.clone(),
            port: config.port,
            serial: None,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("-H").arg(host);
        }
        if let Some(port) = self.port {
            cmd.arg("-P").arg(port.to_string());
        }
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn adb(&self, args: &[&str]) -> Result<Output> {
        tracing::debug!("adb {}", args.join(" "));
        self.command()
            .args(args)
            .output()
            .await
            .map_err(|e| Error::AdbSpawn {
                binary: self.binary.display().to_string(),
                error: e.to_string(),
            })
    }
}

#[async_trait]
impl DeviceSession for AdbSession {
    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    async fn execute(&self, command: &str) -> Result<ShellOutput> {
        let output = self.adb(&["shell", command]).await?;
        let ret = ShellOutput {
            exit_status: output.status.code().map(i64::from).unwrap_or(-1),
            output: combined_output(&output),
        };
        tracing::debug!("Command: {}", command);
        tracing::debug!("Command Output: {}", ret);
        Ok(ret)
    }

    async fn elevate(&self) -> Result<Elevation> {
        let output = self.adb(&["root"]).await?;
        let text = combined_output(&output);
        if text.contains("cannot run as root") {
            return Ok(Elevation::Refused);
        }
        if !output.status.success() {
            return Err(Error::adb_failed("root", &text));
        }
        // adbd restarts when switching to root
        let wait = self.adb(&["wait-for-device"]).await?;
        if !wait.status.success() {
            return Err(Error::adb_failed("wait-for-device", &combined_output(&wait)));
        }
        Ok(Elevation::Granted)
    }

    async fn remount_writable(&self) -> Result<RemountStatus> {
        let output = self.adb(&["remount"]).await?;
        let status = classify_remount(&combined_output(&output), output.status.success());
        tracing::debug!("remount: {:?}", status);
        Ok(status)
    }

    async fn push_file(&self, local: &Path, remote: &str) -> Result<i64> {
        tracing::debug!("Pushing file {} to {}", local.display(), remote);
        let local_str = local.to_string_lossy();
        let output = self.adb(&["push", &local_str, remote]).await?;
        if !output.status.success() {
            tracing::debug!("push failed: {}", combined_output(&output));
            return Ok(0);
        }
        let bytes = parse_pushed_bytes(&combined_output(&output)).unwrap_or_else(|| {
            std::fs::metadata(local)
                .map(|m| i64::try_from(m.len()).unwrap_or(i64::MAX))
                .unwrap_or(0)
        });
        Ok(bytes)
    }

    async fn install_package(&self, local: &Path) -> Result<bool> {
        let local_str = local.to_string_lossy();
        let output = self.adb(&["install", "-r", &local_str]).await?;
        let text = combined_output(&output);
        tracing::debug!("adb install: {}", text.trim());
        Ok(output.status.success() && text.contains("Success"))
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Parse `adb devices` output into `(serial, state)` pairs
pub(crate) fn parse_devices(listing: &str) -> Vec<(String, String)> {
    listing
        .lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some((serial.to_string(), state.to_string()))
        })
        .collect()
}

/// Choose the device to bind to
pub(crate) fn select_device(devices: &[(String, String)], requested: Option<&str>) -> Option<String> {
    let ready = devices.iter().filter(|(_, state)| state == "device");
    match requested {
        Some(wanted) if !wanted.is_empty() => ready
            .map(|(serial, _)| serial)
            .find(|serial| *serial == wanted)
            .cloned(),
        _ => ready.map(|(serial, _)| serial.clone()).next(),
    }
}

/// Extract the byte count from an adb push summary such as
/// `1 file pushed, 0 skipped. 31.2 MB/s (123456 bytes in 0.004s)`
pub(crate) fn parse_pushed_bytes(output: &str) -> Option<i64> {
    let open = output.rfind('(')?;
    let rest = &output[open + 1..];
    let mut parts = rest.split_whitespace();
    let count = parts.next()?.parse().ok()?;
    (parts.next()? == "bytes").then_some(count)
}

/// Map `adb remount` output to a remount status
pub(crate) fn classify_remount(output: &str, success: bool) -> RemountStatus {
    let lower = output.to_lowercase();
    if lower.contains("not running as root") || lower.contains("adb root") {
        RemountStatus::NeedsRoot
    } else if lower.contains("inaccessible") || lower.contains("remount failed") || !success {
        RemountStatus::Inaccessible
    } else {
        RemountStatus::Remounted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "List of devices attached\n\
        * daemon started successfully\n\
        emulator-5554\tdevice\n\
        R58M123ABC\tunauthorized\n\
        0123456789\tdevice\n";

    #[test]
    fn test_parse_devices() {
        let devices = parse_devices(LISTING);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0], ("emulator-5554".to_string(), "device".to_string()));
        assert_eq!(devices[1].1, "unauthorized");
    }

    #[test]
    fn test_select_first_ready_device() {
        let devices = parse_devices(LISTING);
        assert_eq!(select_device(&devices, None), Some("emulator-5554".to_string()));
        assert_eq!(select_device(&devices, Some("")), Some("emulator-5554".to_string()));
    }

    #[test]
    fn test_select_requested_device() {
        let devices = parse_devices(LISTING);
        assert_eq!(
            select_device(&devices, Some("0123456789")),
            Some("0123456789".to_string())
        );
        // Attached but not authorized
        assert_eq!(select_device(&devices, Some("R58M123ABC")), None);
        assert_eq!(select_device(&devices, Some("missing")), None);
    }

    #[test]
    fn test_no_devices() {
        let devices = parse_devices("List of devices attached\n\n");
        assert!(devices.is_empty());
        assert_eq!(select_device(&devices, None), None);
    }

    #[test]
    fn test_parse_pushed_bytes() {
        assert_eq!(
            parse_pushed_bytes("app.apk: 1 file pushed, 0 skipped. 31.2 MB/s (123456 bytes in 0.004s)"),
            Some(123456)
        );
        assert_eq!(parse_pushed_bytes("1 file pushed"), None);
        assert_eq!(parse_pushed_bytes("(error)"), None);
    }

    #[test]
    fn test_classify_remount() {
        assert_eq!(classify_remount("remount succeeded", true), RemountStatus::Remounted);
        assert_eq!(
            classify_remount("Not running as root. Try \"adb root\" first.", false),
            RemountStatus::NeedsRoot
        );
        assert_eq!(
            classify_remount("/system: inaccessible or not found", false),
            RemountStatus::Inaccessible
        );
        assert_eq!(classify_remount("something odd", false), RemountStatus::Inaccessible);
    }
}
