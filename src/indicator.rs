//! Activity indicator
//!
//! A spinner animated by a background task while a device command is in
//! flight. The foreground only flips a watch channel; it never waits on the
//! task, so the indicator cannot delay or reorder device operations.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(100);

/// Handle to the spinner task
#[derive(Debug)]
pub struct Indicator {
    active: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Indicator {
    /// Spawn the spinner task. With `enabled == false` no task is spawned and
    /// start/stop only track state.
    ///
    /// Must be called from within a tokio runtime when enabled.
    pub fn spawn(enabled: bool) -> Self {
        let (active, rx) = watch::channel(false);
        let task = enabled.then(|| tokio::spawn(animate(rx)));
        Self { active, task }
    }

    /// Indicator that never draws
    pub fn disabled() -> Self {
        Self::spawn(false)
    }

    pub fn start(&self) {
        self.active.send_replace(true);
    }

    pub fn stop(&self) {
        if self.is_active() {
            self.active.send_replace(false);
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn animate(mut rx: watch::Receiver<bool>) {
    loop {
        // Idle until started
        loop {
            let started = *rx.borrow_and_update();
            if started {
                break;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        let mut ticker = tokio::time::interval(TICK);

        loop {
            tokio::select! {
                _ = ticker.tick() => spinner.tick(),
                changed = rx.changed() => {
                    if changed.is_err() {
                        spinner.finish_and_clear();
                        return;
                    }
                    let still_active = *rx.borrow_and_update();
                    if !still_active {
                        break;
                    }
                }
            }
        }

        spinner.finish_and_clear();
    }
}
