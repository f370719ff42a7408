//! Error types for tdtk
//!
//! Messages are written for the operator running a test plan, with enough
//! context (paths, module names, device commands) to act on them.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // === Device Errors ===
    #[error("No Android device detected. Connect a device or pass --id <serial>")]
    DeviceNotFound,

    #[error("Failed to run adb ({binary}): {error}")]
    AdbSpawn { binary: String, error: String },

    #[error("adb {command} failed: {message}")]
    AdbFailed { command: String, message: String },

    // === Module Errors ===
    #[error("No modules were detected in '{0}'")]
    NoModules(String),

    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    #[error("Submodule '{submodule}' not found in module '{module}'")]
    SubmoduleNotFound { module: String, submodule: String },

    #[error("Dependency '{dependency}' of '{dependent}' could not be resolved")]
    DependencyNotFound {
        dependent: String,
        dependency: String,
    },

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    // === Test Plan Errors ===
    #[error("Failed to read test plan '{path}': {error}")]
    PlanRead { path: String, error: String },

    #[error("Invalid test plan JSON: {0}")]
    PlanParse(String),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },
}

impl Error {
    /// Create an adb failure error
    pub fn adb_failed(command: &str, message: &str) -> Self {
        Self::AdbFailed {
            command: command.to_string(),
            message: message.trim().to_string(),
        }
    }

    /// Create a submodule not found error
    pub fn submodule_not_found(module: &str, submodule: &str) -> Self {
        Self::SubmoduleNotFound {
            module: module.to_string(),
            submodule: submodule.to_string(),
        }
    }

    /// Create a dependency not found error
    pub fn dependency_not_found(dependent: &str, dependency: &str) -> Self {
        Self::DependencyNotFound {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
        }
    }

    /// Whether this error means a reference could not be resolved.
    ///
    /// The executor counts these as errors rather than failures; nothing ran.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::ModuleNotFound(_)
                | Error::SubmoduleNotFound { .. }
                | Error::DependencyNotFound { .. }
                | Error::DependencyCycle(_)
        )
    }
}
