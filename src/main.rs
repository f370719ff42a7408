//! tdtk - declarative test runner for Android devices
//!
//! Runs test plans made of module submodules against a device reachable
//! through adb.

use clap::Parser;
use tdtk::cli;
use tdtk::commands::RunArgs;
use tdtk::common::logging;

#[derive(Parser)]
#[command(name = "tdtk", about = "Run declarative device test plans over adb")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_guard = logging::init(cli.run.debug);
    if let Some(path) = &log_guard.log_file {
        tracing::debug!("Writing debug log to {}", path.display());
    }

    let summary = cli::dispatch(cli.run).await;
    tracing::debug!("Run finished: {:?}", summary);

    // The printed summary carries the result, never the exit status
    std::process::exit(1);
}
