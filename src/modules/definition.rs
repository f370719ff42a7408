//! Module definition records
//!
//! A definition file maps submodule names to loosely typed records. Each
//! record is validated on its own into a [`SubModule`]; a bad record is
//! reported with a [`DefinitionError`] and never aborts the rest of the file.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use super::submodule::{Dependency, OperationKind, SubModule};
use crate::verify::Expectation;

/// Why a definition record was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("is not a mapping")]
    NotAMapping,

    #[error("is missing a command or type")]
    MissingCommandOrType,

    #[error("is missing an expected output")]
    MissingExpected,

    #[error("has a non-string entry in 'files'")]
    InvalidFileField,

    #[error("has a 'depends' that is not a submodule name")]
    InvalidDependsField,

    #[error("has unknown type '{0}'")]
    UnknownType(String),

    #[error("needs at least one entry in 'files'")]
    MissingFiles,

    #[error("has an invalid '{0}' value")]
    InvalidValue(&'static str),
}

/// Parse a whole definition document (JSON or YAML) into its top-level mapping
pub fn parse_document(text: &str, yaml: bool) -> std::result::Result<Map<String, Value>, String> {
    let value: Value = if yaml {
        serde_yaml::from_str(text).map_err(|e| e.to_string())?
    } else {
        serde_json::from_str(text).map_err(|e| e.to_string())?
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("top level is not a mapping of submodules".to_string()),
    }
}

/// Validate a single record into a submodule
pub fn parse_submodule(name: &str, record: &Value) -> Result<SubModule, DefinitionError> {
    let fields = record.as_object().ok_or(DefinitionError::NotAMapping)?;

    let command = optional_string(fields, "command")?.filter(|c| !c.is_empty());
    let kind = match optional_string(fields, "type")? {
        Some(raw) => Some(parse_kind(&raw)?),
        None => None,
    };
    if command.is_none() && kind.is_none() {
        return Err(DefinitionError::MissingCommandOrType);
    }

    let expected = parse_expected(fields.get("expected"))?;
    let files = parse_files(fields.get("files"))?;
    let depends = parse_depends(fields.get("depends"))?;

    let kind = kind.unwrap_or(OperationKind::Shell);
    match kind {
        OperationKind::Shell if command.is_none() => {
            return Err(DefinitionError::MissingCommandOrType);
        }
        OperationKind::InstallApp | OperationKind::InstallPrivilegedApp | OperationKind::PushAndExecute
            if files.is_empty() =>
        {
            return Err(DefinitionError::MissingFiles);
        }
        _ => {}
    }

    Ok(SubModule {
        name: name.to_string(),
        kind,
        command,
        check: optional_string(fields, "check")?,
        expected,
        timeout: optional_duration(fields, "timeout")?,
        overwrite: optional_bool(fields, "overwrite")?.unwrap_or(false),
        wait: optional_duration(fields, "wait")?,
        depends,
        files,
        silent: optional_bool(fields, "silent")?.unwrap_or(true),
    })
}

fn parse_kind(raw: &str) -> Result<OperationKind, DefinitionError> {
    match raw {
        "shell" => Ok(OperationKind::Shell),
        "install-app" | "app-install" => Ok(OperationKind::InstallApp),
        "install-privileged-app" | "app-install-priv" => Ok(OperationKind::InstallPrivilegedApp),
        "push-and-execute" | "push-exec" => Ok(OperationKind::PushAndExecute),
        other => Err(DefinitionError::UnknownType(other.to_string())),
    }
}

fn parse_expected(value: Option<&Value>) -> Result<Expectation, DefinitionError> {
    match value {
        None | Some(Value::Null) => Err(DefinitionError::MissingExpected),
        Some(Value::String(s)) => Ok(Expectation::Contains(s.clone())),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Expectation::ExitCode)
            .ok_or(DefinitionError::InvalidValue("expected")),
        Some(_) => Err(DefinitionError::InvalidValue("expected")),
    }
}

fn parse_files(value: Option<&Value>) -> Result<Vec<String>, DefinitionError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(DefinitionError::InvalidFileField)
            })
            .collect(),
        Some(_) => Err(DefinitionError::InvalidFileField),
    }
}

fn parse_depends(value: Option<&Value>) -> Result<Option<Dependency>, DefinitionError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Dependency::parse(s)
            .map(Some)
            .ok_or(DefinitionError::InvalidDependsField),
        Some(_) => Err(DefinitionError::InvalidDependsField),
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, DefinitionError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DefinitionError::InvalidValue(key)),
    }
}

fn optional_bool(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<bool>, DefinitionError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(DefinitionError::InvalidValue(key)),
    }
}

/// Seconds, integer or fractional
fn optional_duration(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<Duration>, DefinitionError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|_| DefinitionError::InvalidValue(key)),
            None => Err(DefinitionError::InvalidValue(key)),
        },
        Some(_) => Err(DefinitionError::InvalidValue(key)),
    }
}
