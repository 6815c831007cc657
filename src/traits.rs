//! Core traits for testability and abstraction.

use crate::error::Result;
use crate::tasks::models::{Notification, Task};

/// Where stale-task reminders are delivered.
///
/// The stale-task notifier only decides *when* to remind; this trait decides *how*.
/// The production implementation writes into the tracker's own notification table,
/// while tests use a recording mock.
pub trait NotificationSink {
    /// Deliver a reminder that `task` is still in progress and has gone quiet.
    ///
    /// # Arguments
    ///
    /// * `task` - The stale task, as read before its ping was reset.
    ///
    /// # Returns
    ///
    /// The notification that was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the reminder could not be delivered.
    fn send_reminder(&self, task: &Task) -> Result<Notification>;
}
