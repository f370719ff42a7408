//! tdtk - Device Test Toolkit
//!
//! Declarative test orchestration for Android devices. Modules describe
//! device interactions; test plans invoke them in order.

pub mod cli;
pub mod commands;
pub mod common;
pub mod device;
pub mod executor;
pub mod indicator;
pub mod install;
pub mod modules;
pub mod report;
pub mod verify;

// Re-export commonly used types for tests
pub use common::{Error, Result};
