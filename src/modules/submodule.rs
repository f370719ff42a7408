//! A single invocable unit of device interaction

use std::time::Duration;

use super::RunContext;
use crate::common::{with_parameters, Result};
use crate::verify::{self, Expectation, PollSettings};

/// Built-in operation a submodule performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Run `command` in a device shell
    Shell,
    /// `adb install` the first file
    InstallApp,
    /// Place the first file under priv-app, the rest as permission files
    InstallPrivilegedApp,
    /// Push every file to the exec directory, then run `command` if set
    PushAndExecute,
}

/// Prerequisite submodule reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Submodule of the same module
    Local(String),
    /// Submodule of another module, looked up in the registry
    Remote { module: String, submodule: String },
}

impl Dependency {
    /// `name` → local, `module.name` / `category.module.name` → remote.
    /// Empty segments are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.rsplit_once('.') {
            None if !raw.is_empty() => Some(Dependency::Local(raw.to_string())),
            None => None,
            Some((module, submodule)) => {
                if module.is_empty() || submodule.is_empty() || module.split('.').any(str::is_empty) {
                    return None;
                }
                Some(Dependency::Remote {
                    module: module.to_string(),
                    submodule: submodule.to_string(),
                })
            }
        }
    }
}

/// A validated submodule; immutable once loaded
#[derive(Debug, Clone)]
pub struct SubModule {
    pub name: String,
    pub kind: OperationKind,
    pub command: Option<String>,
    /// Command polled instead of trusting the command's own result
    pub check: Option<String>,
    pub expected: Expectation,
    /// Polling timeout; the configured default applies when unset
    pub timeout: Option<Duration>,
    pub overwrite: bool,
    /// Pause after the submodule ran
    pub wait: Option<Duration>,
    pub depends: Option<Dependency>,
    pub files: Vec<String>,
    /// When false, command output is echoed to the report
    pub silent: bool,
}

impl SubModule {
    /// Run the submodule body. Dependencies are resolved by the caller.
    pub async fn run(&self, ctx: &RunContext<'_>, parameters: Option<&[String]>) -> Result<bool> {
        tracing::debug!(
            "Running {} ({:?}): command {:?}, check {:?}, expected {}, timeout {:?}",
            self.name,
            self.kind,
            self.command,
            self.check,
            self.expected,
            self.timeout
        );

        let ok = match self.kind {
            OperationKind::Shell => self.run_command(ctx, parameters).await?,
            OperationKind::InstallApp => match self.files.first() {
                Some(package) => ctx.installer().install_app(package).await?,
                None => false,
            },
            OperationKind::InstallPrivilegedApp => match self.files.split_first() {
                Some((package, companions)) => {
                    ctx.installer()
                        .install_privileged(package, companions, self.overwrite)
                        .await?
                }
                None => false,
            },
            OperationKind::PushAndExecute => {
                if !ctx.installer().push_files(&self.files).await? {
                    false
                } else if self.command.is_some() {
                    self.run_command(ctx, parameters).await?
                } else {
                    true
                }
            }
        };

        if let Some(wait) = self.wait {
            tracing::debug!("Waiting {:?} after {}", wait, self.name);
            tokio::time::sleep(wait).await;
        }

        Ok(ok)
    }

    async fn run_command(&self, ctx: &RunContext<'_>, parameters: Option<&[String]>) -> Result<bool> {
        let Some(command) = &self.command else {
            tracing::warn!("Submodule {} has no command, skipping", self.name);
            return Ok(false);
        };
        let command = with_parameters(command, parameters);
        tracing::debug!("Running command: {}", command);

        ctx.indicator.start();
        let result = self.execute_and_verify(ctx, &command).await;
        ctx.indicator.stop();
        result
    }

    async fn execute_and_verify(&self, ctx: &RunContext<'_>, command: &str) -> Result<bool> {
        let ret = ctx.session.execute(command).await?;
        if self.silent {
            tracing::debug!("Command Output: {}", ret);
        } else {
            ctx.reporter.command_output(&ret);
        }

        match &self.check {
            Some(check) => {
                let timeouts = &ctx.config.timeouts;
                let settings = PollSettings {
                    timeout: self.timeout.unwrap_or_else(|| timeouts.check_default()),
                    interval: timeouts.poll_interval(),
                    progress_interval: timeouts.progress_interval(),
                };
                let reporter = ctx.reporter;
                verify::poll(ctx.session, check, &self.expected, &settings, || reporter.waiting())
                    .await
            }
            None => Ok(self.expected.is_met(&ret)),
        }
    }
}
