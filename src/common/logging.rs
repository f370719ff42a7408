//! Logging and tracing configuration
//!
//! Operator-facing output goes through the reporter; tracing carries the
//! diagnostic stream (command lines, raw device output, skipped records).

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Handle returned by [`init`]; keep it alive until the process exits so the
/// log file writer flushes.
#[derive(Debug, Default)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
    pub log_file: Option<PathBuf>,
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable. Without it the
/// default is INFO for this crate and WARN for dependencies, or DEBUG for this
/// crate when `debug` is set. In debug mode a copy of the log is also written
/// to `<data dir>/logs/tdtk.log`.
pub fn init(debug: bool) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("tdtk=debug,info")
        } else {
            EnvFilter::new("tdtk=info,warn")
        }
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file = if debug { open_log_file() } else { None };

    match file {
        Some((path, writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            LogGuard {
                _file_guard: Some(guard),
                log_file: Some(path),
            }
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();

            LogGuard::default()
        }
    }
}

fn open_log_file() -> Option<(PathBuf, tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let log_dir = paths::log_dir()?;
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return None;
    }

    let appender = tracing_appender::rolling::never(&log_dir, "tdtk.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Some((log_dir.join("tdtk.log"), writer, guard))
}
