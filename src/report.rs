//! Console reporter
//!
//! Operator-facing output for a run: banner, per-test sections, results and
//! the final summary. Diagnostics go through `tracing` instead.

use std::path::Path;

use colored::Colorize;

use crate::device::ShellOutput;
use crate::executor::Summary;

const RULE: &str = "--------------------------------------------------";

/// Prints run progress and the summary to stdout
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    /// Also print the summary as a single JSON object
    json: bool,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Header printed once the device is known
    pub fn banner(&self, plan: Option<&Path>, device: Option<&str>) {
        println!(
            "\n{}\n",
            "Terra Debug Tool Kit (TDTK) - Test Execution Report".cyan().bold()
        );
        if let Some(plan) = plan {
            println!("{} {}", "Test Plan:".cyan(), plan.display());
        }
        if let Some(device) = device {
            println!("{} {}", "Device:".cyan(), device);
        }
        println!(
            "{} {}",
            "Date:".cyan(),
            chrono::Local::now().format("%b %d, %Y")
        );
    }

    /// Start of a test entry
    pub fn section(&self, test_name: &str, iterations: u32) {
        println!("\n{}", RULE.dimmed());
        if iterations > 1 {
            println!(
                "{} \"{}\" {} times",
                "Running test".cyan().bold(),
                test_name.white().bold(),
                iterations
            );
        } else {
            println!("{} \"{}\"", "Running test:".cyan().bold(), test_name.white().bold());
        }
        println!("{}", RULE.dimmed());
    }

    pub fn iteration(&self, index: u32, test_name: &str) {
        println!("\n  {} {} for \"{}\"", "Iteration".cyan(), index, test_name);
    }

    pub fn passed(&self, test_name: &str) {
        println!(
            "  {} Test \"{}\" completed successfully.",
            "✓".green(),
            test_name
        );
    }

    pub fn failed(&self, test_name: &str) {
        println!("  {} Test \"{}\" has failed.", "✗".red(), test_name);
    }

    /// A validation or resolution error for a single entry
    pub fn error(&self, message: &str) {
        println!("  {} {}", "✗".red(), message.red());
    }

    /// A condition that ends the run early
    pub fn fatal(&self, message: &str) {
        println!("\n    {} {}", "✗".red().bold(), message.red().bold());
    }

    /// A workflow step that found its work already done
    pub fn skipped(&self, message: &str) {
        println!("  {} {}", "-".green(), message.dimmed());
    }

    pub fn waiting(&self) {
        println!("  {}", "Still waiting for expected outcome...".dimmed());
    }

    /// Echo of a command's output for non-silent submodules
    pub fn command_output(&self, ret: &ShellOutput) {
        println!("\n{} {}", "Command Output:".cyan(), ret);
    }

    pub fn summary(&self, summary: &Summary) {
        println!("\n{}", "Test Execution Summary:".cyan().bold());
        println!(
            "  {} Total parsed tests: {}",
            "-".green(),
            summary.total
        );
        println!("  {} Passed: {}", "-".green(), summary.passed);
        if summary.failed > 0 {
            println!("  {} {}", "-".red(), format!("Failed: {}", summary.failed).red());
        }
        if summary.errors > 0 {
            println!("  {} {}", "-".red(), format!("Errors: {}", summary.errors).red());
        }

        if self.json {
            match serde_json::to_string(summary) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("Could not serialize summary: {}", e),
            }
        }
    }
}
