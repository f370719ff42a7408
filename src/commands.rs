//! CLI argument definitions
//!
//! Defines the clap arguments for the test runner.

use clap::Args;
use std::path::PathBuf;

use crate::executor::Target;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a JSON test plan
    pub test_plan: Option<PathBuf>,

    /// Serial of the device to run against (default: first attached device)
    #[arg(long = "id", short = 'i')]
    pub device_id: Option<String>,

    /// Verbose logging, also written to a log file; disables the spinner
    #[arg(long, short)]
    pub debug: bool,

    /// Run a single submodule: module.submodule or category.module.submodule
    #[arg(long, short)]
    pub module: Option<String>,

    /// Configuration file (default: platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory scanned for module definitions
    #[arg(long)]
    pub modules_dir: Option<PathBuf>,

    /// Directory holding files referenced by submodules
    #[arg(long)]
    pub files_dir: Option<PathBuf>,

    /// Also print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// A test plan takes precedence over a single module
    pub fn target(&self) -> Target {
        match (&self.test_plan, &self.module) {
            (Some(plan), _) => Target::Plan(plan.clone()),
            (None, Some(module)) => Target::Module(module.clone()),
            (None, None) => Target::Nothing,
        }
    }
}
