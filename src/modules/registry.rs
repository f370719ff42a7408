//! Module registry and dependency resolution
//!
//! Modules are discovered by walking a directory tree; each definition file
//! becomes one module. Running a submodule first runs its dependency chain:
//! unqualified names stay inside the owning module, qualified names go
//! through the registry.

use std::collections::BTreeMap;
use std::path::Path;

use futures_util::future::{BoxFuture, FutureExt};
use walkdir::WalkDir;

use super::definition::{parse_document, parse_submodule};
use super::submodule::{Dependency, SubModule};
use super::RunContext;
use crate::common::{Error, Result};

const DEFINITION_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// A named collection of submodules loaded from one definition file
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    submodules: BTreeMap<String, SubModule>,
}

impl Module {
    pub fn new(name: impl Into<String>, submodules: BTreeMap<String, SubModule>) -> Self {
        Self {
            name: name.into(),
            submodules,
        }
    }

    pub fn get_submodule(&self, name: &str) -> Option<&SubModule> {
        self.submodules.get(name)
    }

    pub fn submodule_names(&self) -> impl Iterator<Item = &str> {
        self.submodules.keys().map(String::as_str)
    }

    /// Run a submodule of this module after its dependencies succeeded
    pub fn run<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        submodule: &'a str,
        parameters: Option<&'a [String]>,
    ) -> BoxFuture<'a, Result<bool>> {
        self.run_chain(ctx, submodule, parameters, Vec::new())
    }

    fn run_chain<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        name: &'a str,
        parameters: Option<&'a [String]>,
        mut chain: Vec<String>,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            tracing::debug!("Attempting to run {}.{}", self.name, name);
            let submodule = self
                .get_submodule(name)
                .ok_or_else(|| Error::submodule_not_found(&self.name, name))?;

            let qualified = format!("{}.{}", self.name, name);
            if chain.contains(&qualified) {
                chain.push(qualified);
                return Err(Error::DependencyCycle(chain.join(" -> ")));
            }
            chain.push(qualified.clone());

            if let Some(dependency) = &submodule.depends {
                let satisfied = match dependency {
                    Dependency::Local(dep) => {
                        if self.get_submodule(dep).is_none() {
                            return Err(Error::dependency_not_found(&qualified, dep));
                        }
                        self.run_chain(ctx, dep, None, chain).await?
                    }
                    Dependency::Remote {
                        module,
                        submodule: dep,
                    } => {
                        if ctx.registry.get_submodule(module, dep).is_none() {
                            return Err(Error::dependency_not_found(
                                &qualified,
                                &format!("{}.{}", module, dep),
                            ));
                        }
                        ctx.registry.run_chain(ctx, module, dep, None, chain).await?
                    }
                };

                if !satisfied {
                    tracing::debug!("Dependency of {} failed, not running it", qualified);
                    return Ok(false);
                }
            }

            submodule.run(ctx, parameters).await
        }
        .boxed()
    }
}

/// All loaded modules, keyed by identity
#[derive(Debug, Default, Clone)]
pub struct Registry {
    modules: BTreeMap<String, Module>,
}

impl Registry {
    /// Recursively scan `root` for definition files.
    ///
    /// A missing root yields an empty registry. Unreadable files and invalid
    /// records are logged and skipped.
    pub fn load(root: &Path) -> Self {
        let mut registry = Self::default();
        if !root.is_dir() {
            tracing::warn!("Modules directory {} does not exist", root.display());
            return registry;
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let is_definition = entry.file_type().is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext));
            if is_definition {
                tracing::debug!("Scanning file {} for modules.", path.display());
                if let Some(module) = load_module(root, path) {
                    tracing::debug!(
                        "Module {} provides {:?}",
                        module.name,
                        module.submodule_names().collect::<Vec<_>>()
                    );
                    registry.insert(module);
                }
            }
        }

        tracing::debug!("Available modules: {:?}", registry.names().collect::<Vec<_>>());
        registry
    }

    /// Add a module; a module with the same identity is replaced
    pub fn insert(&mut self, module: Module) {
        if self.modules.contains_key(&module.name) {
            tracing::warn!(
                "Module '{}' is defined more than once; the last definition wins",
                module.name
            );
        }
        self.modules.insert(module.name.clone(), module);
    }

    pub fn get(&self, module: &str) -> Option<&Module> {
        self.modules.get(module)
    }

    pub fn get_submodule(&self, module: &str, submodule: &str) -> Option<&SubModule> {
        self.get(module)?.get_submodule(submodule)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Split `module.submodule` or `category.module.submodule` into the
    /// module identity and the submodule name
    pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
        let (module, submodule) = reference.rsplit_once('.')?;
        if submodule.is_empty() || module.split('.').any(str::is_empty) {
            return None;
        }
        Some((module, submodule))
    }

    /// Run a submodule of any module, resolving its dependencies first
    pub fn run<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        module: &'a str,
        submodule: &'a str,
        parameters: Option<&'a [String]>,
    ) -> BoxFuture<'a, Result<bool>> {
        self.run_chain(ctx, module, submodule, parameters, Vec::new())
    }

    fn run_chain<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        module: &'a str,
        submodule: &'a str,
        parameters: Option<&'a [String]>,
        chain: Vec<String>,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            let found = self
                .get(module)
                .ok_or_else(|| Error::ModuleNotFound(module.to_string()))?;
            found.run_chain(ctx, submodule, parameters, chain).await
        }
        .boxed()
    }
}

/// Identity of the module defined at `path`: the file stem directly under
/// `root`, `<parent directory>.<stem>` anywhere deeper
pub fn module_identity(root: &Path, path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let parent = path.parent()?;
    if parent == root {
        return Some(stem.to_string());
    }
    let category = parent.file_name()?.to_str()?;
    Some(format!("{}.{}", category, stem))
}

fn load_module(root: &Path, path: &Path) -> Option<Module> {
    let name = module_identity(root, path)?;
    let shown = path.strip_prefix(root).unwrap_or(path).display().to_string();

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Could not read {}: {}", shown, e);
            return None;
        }
    };
    let yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let records = match parse_document(&text, yaml) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Could not parse {}: {}", shown, e);
            return None;
        }
    };

    let mut submodules = BTreeMap::new();
    for (key, record) in &records {
        match parse_submodule(key, record) {
            Ok(submodule) => {
                tracing::debug!("Method \"{}\" in {} has been validated!", key, shown);
                submodules.insert(key.clone(), submodule);
            }
            Err(e) => {
                tracing::warn!("Method \"{}\" in {} {}, it has been skipped!", key, shown, e);
            }
        }
    }

    if submodules.is_empty() {
        tracing::warn!("{} contains no valid submodules", shown);
        return None;
    }
    Some(Module::new(name, submodules))
}
