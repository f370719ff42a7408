//! Test modules: definitions, submodules and the registry that resolves them

mod definition;
mod registry;
mod submodule;

pub use definition::{parse_document, parse_submodule, DefinitionError};
pub use registry::{module_identity, Module, Registry};
pub use submodule::{Dependency, OperationKind, SubModule};

use crate::common::config::Config;
use crate::device::DeviceSession;
use crate::indicator::Indicator;
use crate::install::Installer;
use crate::report::Reporter;

/// Everything a running submodule may touch
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub session: &'a dyn DeviceSession,
    pub registry: &'a Registry,
    pub config: &'a Config,
    pub reporter: &'a Reporter,
    pub indicator: &'a Indicator,
}

impl<'a> RunContext<'a> {
    pub fn installer(&self) -> Installer<'a> {
        Installer::new(self.session, &self.config.device, &self.config.paths.files_dir, self.reporter)
    }
}
