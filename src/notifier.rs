//! Stale-task notifier.
//!
//! On each pass the notifier reads in-progress tasks that have not pinged within
//! their interval, claims each one by moving its `last_ping` forward, and only then
//! hands the reminder to a [`NotificationSink`]. A claim that loses to a concurrent
//! status change is skipped; that writer already refreshed the ping.

use crate::error::Result;
use crate::tasks::store::TrackerStore;
use crate::traits::NotificationSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest single sleep while waiting for the next pass, so a stop request is
/// noticed promptly.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    /// Tasks a reminder was sent for.
    pub reminded: Vec<i64>,
    /// Tasks whose ping changed underneath the pass.
    pub skipped: Vec<i64>,
    /// Tasks claimed but whose reminder could not be delivered.
    pub failed: Vec<i64>,
}

impl NotifyReport {
    /// Whether the pass found nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reminded.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Periodic reminder driver over a store and a sink.
#[derive(Debug)]
pub struct Notifier<'a, S, N> {
    store: &'a S,
    sink: &'a N,
}

impl<'a, S: TrackerStore, N: NotificationSink> Notifier<'a, S, N> {
    /// Create a notifier.
    pub const fn new(store: &'a S, sink: &'a N) -> Self {
        Self { store, sink }
    }

    /// Run one pass at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale tasks cannot be read or a ping cannot be reset.
    /// Delivery failures are logged and reported in [`NotifyReport::failed`].
    pub fn check_and_notify(&self, now: DateTime<Utc>) -> Result<NotifyReport> {
        let mut report = NotifyReport::default();

        for task in self.store.stale_tasks(now)? {
            if !self.store.reset_ping(task.id, task.last_ping, now)? {
                tracing::warn!(task_id = task.id, "ping changed before reminder; skipping");
                report.skipped.push(task.id);
                continue;
            }

            match self.sink.send_reminder(&task) {
                Ok(_) => {
                    tracing::info!(task_id = task.id, name = %task.name, "sent stale-task reminder");
                    report.reminded.push(task.id);
                }
                Err(e) => {
                    tracing::error!(task_id = task.id, error = %e, "failed to send reminder");
                    report.failed.push(task.id);
                }
            }
        }

        Ok(report)
    }

    /// Run passes every `poll` until `stop` is set. Returns the number of passes.
    ///
    /// A failed pass is logged and the loop carries on.
    pub fn run(&self, poll: Duration, stop: &AtomicBool) -> usize {
        let mut passes = 0;
        tracing::info!(poll_seconds = poll.as_secs(), "notifier started");

        while !stop.load(Ordering::Relaxed) {
            match self.check_and_notify(Utc::now()) {
                Ok(report) if !report.is_empty() => {
                    tracing::debug!(
                        reminded = report.reminded.len(),
                        skipped = report.skipped.len(),
                        failed = report.failed.len(),
                        "notifier pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "notifier pass failed"),
            }
            passes += 1;
            wait(poll, stop);
        }

        tracing::info!(passes, "notifier stopped");
        passes
    }
}

fn wait(poll: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + poll;
    while !stop.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(STOP_CHECK_INTERVAL));
    }
}
