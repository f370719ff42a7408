//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// adb binary and server settings
    #[serde(default)]
    pub adb: AdbConfig,

    /// Local directories for module definitions and staged files
    #[serde(default)]
    pub paths: PathsConfig,

    /// Device-side locations and ownership
    #[serde(default)]
    pub device: DeviceLayout,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// adb invocation settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AdbConfig {
    /// Path to the adb executable (searched in PATH when unset)
    pub binary: Option<PathBuf>,

    /// adb server host (`-H`)
    pub host: Option<String>,

    /// adb server port (`-P`)
    pub port: Option<u16>,
}

impl AdbConfig {
    /// Resolve the adb binary, falling back to PATH lookup
    pub fn resolve_binary(&self) -> PathBuf {
        if let Some(binary) = &self.binary {
            return binary.clone();
        }
        which::which("adb").unwrap_or_else(|_| PathBuf::from("adb"))
    }
}

/// Local directories
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Root directory scanned for module definition files
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Directory holding files referenced by submodules
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            files_dir: default_files_dir(),
        }
    }
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}

/// Device-side locations used by the installation workflow
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceLayout {
    /// Where files are pushed before being moved into place
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Where push-and-execute binaries land
    #[serde(default = "default_exec_dir")]
    pub exec_dir: String,

    /// Root of the product partition
    #[serde(default = "default_product_dir")]
    pub product_dir: String,

    /// Owner assigned to privileged files
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Mode assigned to privileged files
    #[serde(default = "default_file_mode")]
    pub file_mode: String,

    /// Mode assigned to created directories
    #[serde(default = "default_dir_mode")]
    pub dir_mode: String,
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            exec_dir: default_exec_dir(),
            product_dir: default_product_dir(),
            owner: default_owner(),
            file_mode: default_file_mode(),
            dir_mode: default_dir_mode(),
        }
    }
}

fn default_staging_dir() -> String {
    "/sdcard/TDTK".to_string()
}
fn default_exec_dir() -> String {
    "/data/local/tmp".to_string()
}
fn default_product_dir() -> String {
    "/product".to_string()
}
fn default_owner() -> String {
    "root:root".to_string()
}
fn default_file_mode() -> String {
    "644".to_string()
}
fn default_dir_mode() -> String {
    "755".to_string()
}

impl DeviceLayout {
    /// Directory for `privapp-permissions` files
    pub fn permissions_dir(&self) -> String {
        format!("{}/etc/permissions", self.product_dir)
    }

    /// Directory for `default-permissions` files
    pub fn default_permissions_dir(&self) -> String {
        format!("{}/etc/default-permissions", self.product_dir)
    }

    /// Directory a privileged package is installed into
    pub fn priv_app_dir(&self, package: &str) -> String {
        let stem = package.split('.').next().unwrap_or(package);
        format!("{}/priv-app/{}", self.product_dir, stem)
    }

    /// Staging path for a file
    pub fn staged(&self, file: &str) -> String {
        format!("{}/{}", self.staging_dir, file)
    }
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Default polling timeout for submodules with a `check`
    #[serde(default = "default_check_secs")]
    pub check_default_secs: f64,

    /// Delay between two polling samples
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Minimum delay between two "still waiting" notices
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            check_default_secs: default_check_secs(),
            poll_interval_ms: default_poll_interval(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

fn default_check_secs() -> f64 {
    2.0
}
fn default_poll_interval() -> u64 {
    200
}
fn default_progress_interval() -> u64 {
    1000
}

impl Timeouts {
    /// Falls back to the built-in default when the configured value is not
    /// a representable duration
    pub fn check_default(&self) -> Duration {
        Duration::try_from_secs_f64(self.check_default_secs).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid check_default_secs {}, using {}s",
                self.check_default_secs,
                default_check_secs()
            );
            Duration::from_secs_f64(default_check_secs())
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Config {
    /// Load configuration from an explicit path or the default config file
    ///
    /// Returns default configuration if no file exists. An explicit path that
    /// does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
