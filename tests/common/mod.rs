//! Shared helpers for integration tests
//!
//! `FakeDevice` is a scripted in-memory device: shell commands answer from a
//! script (exit 0 with empty output by default), pushed and moved files live
//! in a virtual filesystem, and every call is recorded in order.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use tdtk::common::config::Config;
use tdtk::device::{DeviceSession, Elevation, RemountStatus, ShellOutput};
use tdtk::Result;

#[derive(Default)]
struct State {
    calls: Vec<String>,
    files: HashSet<String>,
    responses: HashMap<String, VecDeque<ShellOutput>>,
    remounts: VecDeque<RemountStatus>,
    failing_moves: HashSet<String>,
}

/// Scripted device; clones share state so a test can keep a handle after
/// boxing one into the executor
#[derive(Clone)]
pub struct FakeDevice {
    serial: Option<String>,
    elevation: Elevation,
    state: Arc<Mutex<State>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            serial: Some("emulator-5554".to_string()),
            elevation: Elevation::Granted,
            state: Arc::default(),
        }
    }

    /// Device that was never detected
    pub fn absent() -> Self {
        Self {
            serial: None,
            ..Self::new()
        }
    }

    pub fn refusing_root(mut self) -> Self {
        self.elevation = Elevation::Refused;
        self
    }

    /// Answers for successive runs of `command`; the last one repeats
    pub fn respond(&self, command: &str, outputs: Vec<ShellOutput>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), outputs.into());
        self
    }

    /// Statuses for successive remounts; `Remounted` once exhausted
    pub fn remounts(&self, statuses: Vec<RemountStatus>) -> &Self {
        self.state.lock().unwrap().remounts = statuses.into();
        self
    }

    /// Put a file on the device
    pub fn add_file(&self, path: &str) -> &Self {
        self.state.lock().unwrap().files.insert(path.to_string());
        self
    }

    /// Make moves to `destination` fail
    pub fn fail_move_to(&self, destination: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .failing_moves
            .insert(destination.to_string());
        self
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains(path)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Recorded calls starting with `prefix`
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn ran(&self, command: &str) -> bool {
        self.calls().contains(&format!("shell {}", command))
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl DeviceSession for FakeDevice {
    fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    async fn execute(&self, command: &str) -> Result<ShellOutput> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("shell {}", command));
        let ret = match state.responses.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => ShellOutput::new(0, ""),
        };
        Ok(ret)
    }

    async fn elevate(&self) -> Result<Elevation> {
        self.record("root".to_string());
        Ok(self.elevation)
    }

    async fn remount_writable(&self) -> Result<RemountStatus> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("remount".to_string());
        Ok(state.remounts.pop_front().unwrap_or(RemountStatus::Remounted))
    }

    async fn push_file(&self, local: &Path, remote: &str) -> Result<i64> {
        self.record(format!("push {} {}", local.display(), remote));
        let size = fs::metadata(local).map(|m| m.len() as i64).unwrap_or(0);
        if size > 0 {
            self.state.lock().unwrap().files.insert(remote.to_string());
        }
        Ok(size)
    }

    async fn install_package(&self, local: &Path) -> Result<bool> {
        self.record(format!("install {}", local.display()));
        Ok(local.exists())
    }

    async fn path_exists(&self, path: &str) -> Result<bool> {
        self.record(format!("exists {}", path));
        Ok(self.has_file(path))
    }

    async fn create_dir(&self, path: &str, mode: &str) -> Result<bool> {
        self.record(format!("mkdir {} {}", path, mode));
        Ok(true)
    }

    async fn move_file(&self, source: &str, destination: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("mv {} {}", source, destination));
        if state.failing_moves.contains(destination) || !state.files.remove(source) {
            return Ok(false);
        }
        state.files.insert(destination.to_string());
        Ok(true)
    }

    async fn set_owner_and_mode(&self, path: &str, owner: &str, mode: &str) -> Result<bool> {
        self.record(format!("chown {} {} {}", path, owner, mode));
        Ok(self.has_file(path))
    }

    async fn cleanup(&self, staging_dir: &str) -> Result<()> {
        self.record(format!("rm {}", staging_dir));
        Ok(())
    }
}

pub fn out(exit_status: i64, output: &str) -> ShellOutput {
    ShellOutput::new(exit_status, output)
}

/// Temporary modules and files directories
pub struct TestContext {
    dir: TempDir,
    pub modules_dir: PathBuf,
    pub files_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let modules_dir = dir.path().join("modules");
        let files_dir = dir.path().join("files");
        fs::create_dir_all(&modules_dir).expect("Failed to create modules dir");
        fs::create_dir_all(&files_dir).expect("Failed to create files dir");
        Self {
            dir,
            modules_dir,
            files_dir,
        }
    }

    /// Write a definition file relative to the modules directory
    pub fn module(&self, relative: &str, content: &str) -> &Self {
        let path = self.modules_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create module category");
        }
        fs::write(path, content).expect("Failed to write module");
        self
    }

    /// Write a local file that submodules can stage
    pub fn file(&self, name: &str) -> &Self {
        fs::write(self.files_dir.join(name), format!("contents of {}", name))
            .expect("Failed to write file");
        self
    }

    /// Write a test plan and return its path
    pub fn plan(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("plan.json");
        fs::write(&path, content).expect("Failed to write plan");
        path
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.paths.modules_dir = self.modules_dir.clone();
        config.paths.files_dir = self.files_dir.clone();
        config
    }
}

/// Executor over the context's modules with a quiet indicator
pub fn executor(ctx: &TestContext, device: &FakeDevice) -> tdtk::executor::TestExecutor {
    let config = ctx.config();
    let registry = tdtk::modules::Registry::load(&config.paths.modules_dir);
    tdtk::executor::TestExecutor::new(
        Box::new(device.clone()),
        registry,
        config,
        tdtk::report::Reporter::default(),
        tdtk::indicator::Indicator::disabled(),
    )
}
