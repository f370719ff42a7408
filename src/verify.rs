//! Verification protocol
//!
//! Judges a command result against an [`Expectation`], either once against
//! the primary command's own result or by polling a secondary `check`
//! command until it succeeds or the timeout elapses.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::common::Result;
use crate::device::{DeviceSession, ShellOutput};

/// What a command result must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Substring that must appear in the output
    Contains(String),
    /// Exact exit status
    ExitCode(i64),
}

impl Expectation {
    /// Immediate judgment of a primary command result
    pub fn is_met(&self, result: &ShellOutput) -> bool {
        match self {
            Expectation::Contains(needle) => result.output.contains(needle.as_str()),
            Expectation::ExitCode(code) => result.exit_status == *code,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Contains(needle) => write!(f, "output containing '{}'", needle),
            Expectation::ExitCode(code) => write!(f, "exit status {}", code),
        }
    }
}

/// Timing parameters for polling a check command
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Overall deadline measured from the first sample
    pub timeout: Duration,
    /// Delay between samples
    pub interval: Duration,
    /// Minimum delay between two progress notices
    pub progress_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(200),
            progress_interval: Duration::from_secs(1),
        }
    }
}

/// Rate limiter for "still waiting" notices.
///
/// Silent until the timeout midpoint, then fires at most once per interval.
/// It never influences the polling deadline.
#[derive(Debug)]
pub struct ProgressThrottle {
    midpoint: Instant,
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(start: Instant, timeout: Duration, interval: Duration) -> Self {
        Self {
            midpoint: start + timeout / 2,
            interval,
            last: None,
        }
    }

    /// Whether a notice may be emitted at `now`; records it if so
    pub fn should_notify(&mut self, now: Instant) -> bool {
        if now < self.midpoint {
            return false;
        }
        if let Some(last) = self.last {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Poll `check` until `expected` holds or `settings.timeout` elapses.
///
/// Returns `true` at the first satisfying sample. Each sample is bounded by
/// the remaining time, so the whole poll never outlives the timeout.
/// `on_waiting` is invoked whenever the progress throttle allows a notice.
pub async fn poll<F>(
    session: &dyn DeviceSession,
    check: &str,
    expected: &Expectation,
    settings: &PollSettings,
    mut on_waiting: F,
) -> Result<bool>
where
    F: FnMut() + Send,
{
    let start = Instant::now();
    let deadline = start + settings.timeout;
    let mut throttle = ProgressThrottle::new(start, settings.timeout, settings.progress_interval);

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }

        match tokio::time::timeout(deadline - now, sample_once(session, check, expected)).await {
            Ok(satisfied) => {
                if satisfied? {
                    return Ok(true);
                }
            }
            Err(_) => {
                tracing::debug!("Check '{}' still running at deadline", check);
                return Ok(false);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        if throttle.should_notify(now) {
            on_waiting();
        }
        tokio::time::sleep(settings.interval.min(deadline - now)).await;
    }
}

async fn sample_once(
    session: &dyn DeviceSession,
    check: &str,
    expected: &Expectation,
) -> Result<bool> {
    match expected {
        Expectation::Contains(needle) => {
            let output = session.sample(check).await?;
            tracing::debug!("Command: {}", check);
            tracing::debug!("Command Output: {}", output.trim());
            Ok(output.contains(needle.as_str()))
        }
        Expectation::ExitCode(_) => {
            let ret = session.execute(check).await?;
            Ok(expected.is_met(&ret))
        }
    }
}
