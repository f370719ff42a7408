//! Device session
//!
//! The engine talks to the device exclusively through [`DeviceSession`].
//! [`AdbSession`] implements it on top of the `adb` binary; tests substitute
//! a scripted in-memory device.

mod adb;

pub use adb::AdbSession;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::common::Result;

/// Exit status and combined output of a shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_status: i64,
    pub output: String,
}

impl ShellOutput {
    pub fn new(exit_status: i64, output: impl Into<String>) -> Self {
        Self {
            exit_status,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

impl fmt::Display for ShellOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = self.output.trim();
        if output.is_empty() {
            write!(f, "{}", self.exit_status)
        } else {
            write!(f, "{}", output)
        }
    }
}

/// Outcome of a request for root mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    Granted,
    Refused,
}

/// Outcome of remounting the system partitions read-write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemountStatus {
    Remounted,
    /// adbd must run as root before remounting
    NeedsRoot,
    Inaccessible,
}

/// Operations the engine needs from a connected device.
///
/// Filesystem helpers have default implementations expressed as shell
/// commands, so an implementation only has to provide the transport.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Serial of the connected device, `None` when no device was detected
    fn serial(&self) -> Option<&str>;

    /// Run a shell command and capture its exit status and output
    async fn execute(&self, command: &str) -> Result<ShellOutput>;

    /// Take a single output sample of a check command
    async fn sample(&self, command: &str) -> Result<String> {
        Ok(self.execute(command).await?.output)
    }

    /// Restart the device-side daemon with root privileges
    async fn elevate(&self) -> Result<Elevation>;

    /// Remount system partitions read-write
    async fn remount_writable(&self) -> Result<RemountStatus>;

    /// Copy a local file to the device; returns bytes transferred (≤0 on failure)
    async fn push_file(&self, local: &Path, remote: &str) -> Result<i64>;

    /// Install a package from a local file
    async fn install_package(&self, local: &Path) -> Result<bool>;

    /// Whether a regular file exists at `path`
    async fn path_exists(&self, path: &str) -> Result<bool> {
        let ret = self.execute(&format!("[ -f {} ]", path)).await?;
        tracing::debug!("Existence check for {} returned {}", path, ret.exit_status);
        Ok(ret.success())
    }

    /// Create a directory (and parents) with the given mode
    async fn create_dir(&self, path: &str, mode: &str) -> Result<bool> {
        let ret = self
            .execute(&format!("mkdir -p {path} && chmod {mode} {path}"))
            .await?;
        Ok(ret.success())
    }

    /// Move a file on the device
    async fn move_file(&self, source: &str, destination: &str) -> Result<bool> {
        let ret = self.execute(&format!("mv {} {}", source, destination)).await?;
        if !ret.success() {
            tracing::debug!("mv {} {} failed: {}", source, destination, ret);
        }
        Ok(ret.success())
    }

    /// Assign owner and mode to a file
    async fn set_owner_and_mode(&self, path: &str, owner: &str, mode: &str) -> Result<bool> {
        let ret = self
            .execute(&format!("chown {owner} {path} && chmod {mode} {path}"))
            .await?;
        if !ret.success() {
            tracing::debug!("chown/chmod {} failed: {}", path, ret);
        }
        Ok(ret.success())
    }

    /// Remove the staging directory at the end of a run
    async fn cleanup(&self, staging_dir: &str) -> Result<()> {
        self.execute(&format!("rm -rf {}", staging_dir)).await?;
        Ok(())
    }
}
