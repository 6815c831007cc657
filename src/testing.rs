//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit tests.

#![allow(dead_code)]

use crate::error::{Error, Result};
use crate::tasks::models::{Notification, NotificationKind, Task};
use crate::traits::NotificationSink;
use chrono::Utc;
use std::cell::RefCell;

/// A mock notification sink for testing.
///
/// Records every reminder it is asked to send, or fails on demand.
#[derive(Debug, Default)]
pub struct MockNotificationSink {
    sent: RefCell<Vec<Notification>>,
    fail_with: RefCell<Option<String>>,
}

impl MockNotificationSink {
    /// Create a new mock sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.borrow_mut() = Some(message.to_string());
    }

    /// Ids of tasks reminded so far, in order.
    #[must_use]
    pub fn reminded_task_ids(&self) -> Vec<i64> {
        self.sent.borrow().iter().map(|n| n.task_id).collect()
    }

    /// Everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }
}

impl NotificationSink for MockNotificationSink {
    fn send_reminder(&self, task: &Task) -> Result<Notification> {
        if let Some(message) = self.fail_with.borrow().as_ref() {
            return Err(Error::Io(std::io::Error::other(message.clone())));
        }

        let mut sent = self.sent.borrow_mut();
        let notification = Notification {
            id: i64::try_from(sent.len()).unwrap_or(i64::MAX) + 1,
            task_id: task.id,
            task_name: task.name.clone(),
            message: Notification::reminder_message(task.id, &task.name),
            kind: NotificationKind::Reminder,
            is_read: false,
            created_at: Utc::now(),
        };
        sent.push(notification.clone());
        Ok(notification)
    }
}
