//! Installation workflows
//!
//! Privileged installs place a package and its permission files directly on
//! the product partition; plain installs go through the package manager.
//! Every step reports success as a boolean and the first failure ends the
//! workflow without rolling back earlier steps.

use std::path::Path;

use crate::common::config::DeviceLayout;
use crate::common::Result;
use crate::device::{DeviceSession, Elevation, RemountStatus};
use crate::report::Reporter;

/// Kind of a file accompanying a privileged package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    PrivappPermissions,
    DefaultPermissions,
}

impl CompanionKind {
    /// Route a companion file by name
    pub fn classify(file: &str) -> Option<Self> {
        if file.contains("privapp-permissions") {
            Some(CompanionKind::PrivappPermissions)
        } else if file.contains("default-permissions") {
            Some(CompanionKind::DefaultPermissions)
        } else {
            None
        }
    }

    pub fn destination_dir(&self, layout: &DeviceLayout) -> String {
        match self {
            CompanionKind::PrivappPermissions => layout.permissions_dir(),
            CompanionKind::DefaultPermissions => layout.default_permissions_dir(),
        }
    }
}

/// Runs installation workflows against a device session
pub struct Installer<'a> {
    session: &'a dyn DeviceSession,
    layout: &'a DeviceLayout,
    files_dir: &'a Path,
    reporter: &'a Reporter,
}

impl<'a> Installer<'a> {
    pub fn new(
        session: &'a dyn DeviceSession,
        layout: &'a DeviceLayout,
        files_dir: &'a Path,
        reporter: &'a Reporter,
    ) -> Self {
        Self {
            session,
            layout,
            files_dir,
            reporter,
        }
    }

    /// Install `package` as a privileged app together with its permission files
    pub async fn install_privileged(
        &self,
        package: &str,
        companions: &[String],
        overwrite: bool,
    ) -> Result<bool> {
        tracing::debug!("Installing privileged app {} (overwrite: {})", package, overwrite);

        if !self.elevate().await? || !self.remount().await? {
            return Ok(false);
        }

        for file in std::iter::once(package).chain(companions.iter().map(String::as_str)) {
            if !self.stage(file).await? {
                return Ok(false);
            }
        }

        let package_dir = self.layout.priv_app_dir(package);

        if !overwrite {
            for file in companions {
                let Some(kind) = classify_companion(file) else {
                    continue;
                };
                let destination = format!("{}/{}", kind.destination_dir(self.layout), file);
                if self.session.path_exists(&destination).await? {
                    self.reporter.skipped(&format!(
                        "File {} already exists on the device, skipping...",
                        destination
                    ));
                    continue;
                }
                if !self.place(file, &kind.destination_dir(self.layout), false).await? {
                    return Ok(false);
                }
            }

            let installed = format!("{}/{}", package_dir, package);
            if self.session.path_exists(&installed).await? {
                self.reporter.skipped(&format!(
                    "File {} already exists on the device, skipping...",
                    installed
                ));
                return Ok(true);
            }
        } else {
            for file in companions {
                let Some(kind) = classify_companion(file) else {
                    continue;
                };
                if !self.place(file, &kind.destination_dir(self.layout), false).await? {
                    return Ok(false);
                }
            }
            tracing::debug!("Overwriting {}", package);
        }

        self.place(package, &package_dir, true).await
    }

    /// Install a regular app through the package manager
    pub async fn install_app(&self, package: &str) -> Result<bool> {
        tracing::debug!("Installing app {}", package);
        if !self.elevate().await? || !self.remount().await? {
            return Ok(false);
        }
        self.session
            .install_package(&self.files_dir.join(package))
            .await
    }

    /// Push files to the executable directory and mark them executable
    pub async fn push_files(&self, files: &[String]) -> Result<bool> {
        for file in files {
            let remote = format!("{}/{}", self.layout.exec_dir, file);
            let pushed = self
                .session
                .push_file(&self.files_dir.join(file), &remote)
                .await?;
            if pushed <= 0 {
                tracing::debug!("Failed to push {}", file);
                return Ok(false);
            }
            let ret = self.session.execute(&format!("chmod 755 {}", remote)).await?;
            if !ret.success() {
                tracing::debug!("Failed to make {} executable: {}", remote, ret);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn elevate(&self) -> Result<bool> {
        match self.session.elevate().await? {
            Elevation::Granted => Ok(true),
            Elevation::Refused => {
                self.reporter.error("Device refused to run adbd as root!");
                Ok(false)
            }
        }
    }

    /// Remount read-write, elevating and retrying once if root is required
    async fn remount(&self) -> Result<bool> {
        let mut bail = false;
        loop {
            match self.session.remount_writable().await? {
                RemountStatus::Remounted => return Ok(true),
                RemountStatus::NeedsRoot if !bail => {
                    if !self.elevate().await? {
                        self.reporter.error("Failed to remount device as RW!");
                        return Ok(false);
                    }
                    bail = true;
                }
                RemountStatus::NeedsRoot | RemountStatus::Inaccessible => {
                    self.reporter.error("Failed to remount device as RW!");
                    return Ok(false);
                }
            }
        }
    }

    async fn stage(&self, file: &str) -> Result<bool> {
        let pushed = self
            .session
            .push_file(&self.files_dir.join(file), &self.layout.staged(file))
            .await?;
        if pushed <= 0 {
            self.reporter.error(&format!("Failed to push {} to the device", file));
            return Ok(false);
        }
        Ok(true)
    }

    /// Move a staged file into `directory` and fix its owner and mode
    async fn place(&self, file: &str, directory: &str, create_dir: bool) -> Result<bool> {
        if create_dir {
            tracing::debug!("Creating directory {} with {} permissions", directory, self.layout.dir_mode);
            if !self.session.create_dir(directory, &self.layout.dir_mode).await? {
                return Ok(false);
            }
        }

        let destination = format!("{}/{}", directory, file);
        tracing::debug!("Moving file {} to {}", self.layout.staged(file), destination);
        if !self
            .session
            .move_file(&self.layout.staged(file), &destination)
            .await?
        {
            self.reporter
                .error(&format!("Failed to move {} to {}", file, destination));
            return Ok(false);
        }

        if !self
            .session
            .set_owner_and_mode(&destination, &self.layout.owner, &self.layout.file_mode)
            .await?
        {
            self.reporter
                .error(&format!("Failed to change ownership of {}", destination));
            return Ok(false);
        }
        Ok(true)
    }
}

fn classify_companion(file: &str) -> Option<CompanionKind> {
    let kind = CompanionKind::classify(file);
    if kind.is_none() {
        tracing::warn!("Ignoring companion file {} with no known destination", file);
    }
    kind
}
