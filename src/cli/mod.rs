//! CLI command handling
//!
//! Wires configuration, the device session and the module registry into a
//! test executor and runs the requested target.

use std::io::IsTerminal;

use crate::commands::RunArgs;
use crate::common::config::Config;
use crate::common::Error;
use crate::device::{AdbSession, DeviceSession};
use crate::executor::{Summary, TestExecutor};
use crate::indicator::Indicator;
use crate::modules::Registry;
use crate::report::Reporter;

/// Run the target selected on the command line
///
/// Every path ends in a printed summary, including a configuration file that
/// cannot be loaded.
pub async fn dispatch(args: RunArgs) -> Summary {
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return bail_on_config(&args, e),
    };
    if let Some(dir) = &args.modules_dir {
        config.paths.modules_dir = dir.clone();
    }
    if let Some(dir) = &args.files_dir {
        config.paths.files_dir = dir.clone();
    }

    let session: Box<dyn DeviceSession> =
        match AdbSession::connect(&config.adb, args.device_id.as_deref()).await {
            Ok(session) => Box::new(session),
            Err(e) => {
                tracing::warn!("{}", e);
                Box::new(AdbSession::detached(&config.adb))
            }
        };

    let registry = Registry::load(&config.paths.modules_dir);
    let indicator = Indicator::spawn(!args.debug && std::io::stdout().is_terminal());
    let reporter = Reporter::new(args.json);

    let target = args.target();
    let mut executor = TestExecutor::new(session, registry, config, reporter, indicator);
    executor.run(target).await
}

fn bail_on_config(args: &RunArgs, error: Error) -> Summary {
    tracing::debug!("Configuration failed to load: {:?}", error);
    let reporter = Reporter::new(args.json);
    reporter.fatal(&format!("{}, bailing!", error));

    let summary = Summary {
        bail: Some(error.to_string()),
        ..Summary::default()
    };
    reporter.summary(&summary);
    summary
}
