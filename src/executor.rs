//! Test plan execution
//!
//! The executor walks a fixed sequence of states: detect the device, check
//! that modules were loaded, read the plan, run every entry in order and
//! finish. A bail condition in any early state jumps straight to the end.
//! Counters are owned here and only ever touched by the executor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::device::{DeviceSession, Elevation};
use crate::indicator::Indicator;
use crate::modules::{Registry, RunContext};
use crate::report::Reporter;

/// One invocation in a test plan
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanEntry {
    #[serde(default)]
    pub test_name: Option<String>,
    /// `module.submodule` or `category.module.submodule`
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<String>>,
    /// Additional iterations after the first
    #[serde(default)]
    pub repeat: u32,
}

impl PlanEntry {
    /// Interpret one raw plan element; fails on non-objects and mistyped fields
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }
}

/// Read a plan file: a JSON array of entries, left raw so that one bad entry
/// does not reject the others
pub fn load_plan(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::PlanRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| Error::PlanParse(e.to_string()))
}

/// Executor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DeviceDetected,
    ModulesLoaded,
    PlanLoaded,
    Running,
    Finished,
}

/// Run counters; `passed + failed == total` always holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
    /// Fatal condition that ended the run early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bail: Option<String>,
}

/// What to run
#[derive(Debug, Clone)]
pub enum Target {
    Plan(PathBuf),
    /// A single `module.submodule` reference
    Module(String),
    Nothing,
}

/// Runs test plans against a device session
pub struct TestExecutor {
    session: Box<dyn DeviceSession>,
    registry: Registry,
    config: Config,
    reporter: Reporter,
    indicator: Indicator,
    state: RunState,
    summary: Summary,
    /// Whether the device accepted root at startup
    elevated: bool,
}

impl TestExecutor {
    pub fn new(
        session: Box<dyn DeviceSession>,
        registry: Registry,
        config: Config,
        reporter: Reporter,
        indicator: Indicator,
    ) -> Self {
        Self {
            session,
            registry,
            config,
            reporter,
            indicator,
            state: RunState::Idle,
            summary: Summary::default(),
            elevated: false,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Run `target` to completion and return the final counters
    pub async fn run(&mut self, target: Target) -> Summary {
        let plan_path = match &target {
            Target::Plan(path) => Some(path.as_path()),
            _ => None,
        };
        self.reporter.banner(plan_path, self.session.serial());

        if let Err(e) = self.prepare(&target).await {
            self.bail(e);
        }

        self.finish().await;
        self.summary.clone()
    }

    async fn prepare(&mut self, target: &Target) -> Result<()> {
        let serial = self.session.serial().ok_or(Error::DeviceNotFound)?;
        tracing::debug!("Device detected with ID: {}", serial);
        self.transition(RunState::DeviceDetected);

        self.elevated = match self.session.elevate().await? {
            Elevation::Granted => true,
            Elevation::Refused => {
                self.reporter
                    .error("Device refused to run adbd as root, tests will not run!");
                false
            }
        };

        if self.registry.is_empty() {
            return Err(Error::NoModules(
                self.config.paths.modules_dir.display().to_string(),
            ));
        }
        tracing::debug!("{} modules loaded", self.registry.len());
        self.transition(RunState::ModulesLoaded);

        let entries = match target {
            Target::Plan(path) => load_plan(path)?,
            Target::Module(reference) => {
                vec![serde_json::json!({"test_name": reference, "module": reference})]
            }
            Target::Nothing => Vec::new(),
        };
        self.transition(RunState::PlanLoaded);

        for entry in &entries {
            self.transition(RunState::Running);
            self.run_entry(entry).await;
        }
        Ok(())
    }

    fn bail(&mut self, error: Error) {
        let message = match &error {
            Error::DeviceNotFound => "No devices detected, bailing!".to_string(),
            Error::NoModules(_) => "No modules were detected nor loaded!".to_string(),
            Error::PlanParse(_) => format!("Invalid test plan JSON provided, bailing! ({})", error),
            other => format!("{}, bailing!", other),
        };
        tracing::debug!("Bail in state {:?}: {}", self.state, error);
        self.reporter.fatal(&message);
        self.summary.bail = Some(error.to_string());
    }

    async fn finish(&mut self) {
        self.transition(RunState::Finished);
        self.reporter.summary(&self.summary);

        if self.session.serial().is_some() {
            // Failure to clean up does not change the outcome
            if let Err(e) = self.session.cleanup(&self.config.device.staging_dir).await {
                tracing::debug!("Cleanup failed: {}", e);
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            tracing::debug!("Executor state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    async fn run_entry(&mut self, raw: &Value) {
        let entry = match PlanEntry::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                self.reporter
                    .error(&format!("Test entry {} is malformed: {}", raw, e));
                self.summary.errors += 1;
                return;
            }
        };
        let Some((test_name, module, submodule)) = self.validate(&entry) else {
            self.summary.errors += 1;
            return;
        };

        if self.registry.get(module).is_none() {
            self.reporter.error(&format!(
                "Module '{}' not found for test '{}'!",
                module, test_name
            ));
            self.summary.errors += 1;
            return;
        }
        if self.registry.get_submodule(module, submodule).is_none() {
            self.reporter.error(&format!(
                "Submodule '{}' not found in module '{}' for test '{}'!",
                submodule, module, test_name
            ));
            self.summary.errors += 1;
            return;
        }

        let iterations = entry.repeat.saturating_add(1);
        self.reporter.section(test_name, iterations);
        tracing::debug!("Test '{}' in the test plan has been deemed valid!", test_name);

        for index in 0..iterations {
            if iterations > 1 {
                self.reporter.iteration(index, test_name);
            }
            let result = self
                .execute(module, submodule, entry.parameters.as_deref())
                .await;
            self.record(test_name, result);
        }
    }

    fn validate<'e>(&self, entry: &'e PlanEntry) -> Option<(&'e str, &'e str, &'e str)> {
        let Some(test_name) = entry.test_name.as_deref().filter(|n| !n.is_empty()) else {
            self.reporter.error("Test is missing the 'test_name' field!");
            return None;
        };
        let Some(reference) = entry.module.as_deref().filter(|m| !m.is_empty()) else {
            self.reporter.error(&format!(
                "Test '{}' is missing the 'module' field!",
                test_name
            ));
            return None;
        };
        let Some((module, submodule)) = Registry::split_reference(reference) else {
            self.reporter.error(&format!(
                "Test '{}' has an invalid module format. Expected 'module.submodule' or 'category.module.submodule' format!",
                test_name
            ));
            return None;
        };
        Some((test_name, module, submodule))
    }

    async fn execute(
        &self,
        module: &str,
        submodule: &str,
        parameters: Option<&[String]>,
    ) -> Result<bool> {
        if !self.elevated {
            self.reporter.error("Device is not running as root!");
            return Ok(false);
        }
        let ctx = RunContext {
            session: self.session.as_ref(),
            registry: &self.registry,
            config: &self.config,
            reporter: &self.reporter,
            indicator: &self.indicator,
        };
        self.registry.run(&ctx, module, submodule, parameters).await
    }

    fn record(&mut self, test_name: &str, result: Result<bool>) {
        match result {
            Ok(true) => {
                self.reporter.passed(test_name);
                self.summary.passed += 1;
                self.summary.total += 1;
            }
            Ok(false) => {
                self.reporter.failed(test_name);
                self.summary.failed += 1;
                self.summary.total += 1;
            }
            Err(e) if e.is_resolution() => {
                self.reporter
                    .error(&format!("Test \"{}\" could not be resolved: {}", test_name, e));
                self.summary.errors += 1;
            }
            Err(e) => {
                tracing::debug!("Test {} raised: {}", test_name, e);
                self.reporter.error(&e.to_string());
                self.reporter.failed(test_name);
                self.summary.failed += 1;
                self.summary.total += 1;
            }
        }
    }
}
