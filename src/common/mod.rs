//! Common utilities shared by the registry, device session and executor

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Append invocation parameters to a command, space separated
pub fn with_parameters(command: &str, parameters: Option<&[String]>) -> String {
    match parameters {
        Some(params) if !params.is_empty() => format!("{} {}", command, params.join(" ")),
        _ => command.to_string(),
    }
}
