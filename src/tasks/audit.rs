//! Audit comments emitted by status-changing operations.
//!
//! Audit appends are best-effort. A failed append is logged and collected as an
//! [`AuditFailure`] on the operation's [`Applied`] result; the state change it
//! describes still commits.

use crate::tasks::models::{Author, Comment};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// An audit comment that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    /// Task the comment belonged to.
    pub task_id: i64,
    /// The text that was lost.
    pub text: String,
    /// Why the write failed.
    pub reason: String,
}

impl std::fmt::Display for AuditFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "audit comment for task {} not recorded ({}): {}",
            self.task_id, self.reason, self.text
        )
    }
}

/// The result of a mutation plus any audit comments that failed to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied<T> {
    /// What the operation produced.
    pub value: T,
    /// Audit appends that failed.
    pub warnings: Vec<AuditFailure>,
}

impl<T> Applied<T> {
    /// Whether every audit comment was recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Discard the warnings.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Append a comment row and return it.
///
/// # Errors
///
/// Returns the underlying `SQLite` error if the insert fails.
pub fn insert_comment(
    conn: &Connection,
    task_id: i64,
    text: &str,
    author: Author,
    at: DateTime<Utc>,
) -> rusqlite::Result<Comment> {
    conn.execute(
        "INSERT INTO comments (task_id, text, author, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![task_id, text, author, at],
    )?;

    Ok(Comment {
        id: conn.last_insert_rowid(),
        task_id,
        text: text.to_string(),
        author,
        timestamp: at,
    })
}

/// Collects audit failures over the course of one operation.
#[derive(Debug, Default)]
pub struct AuditTrail {
    warnings: Vec<AuditFailure>,
}

impl AuditTrail {
    /// Start an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an audit comment, keeping any failure as a warning.
    pub fn record(&mut self, conn: &Connection, task_id: i64, text: &str, author: Author) {
        if let Err(e) = insert_comment(conn, task_id, text, author, Utc::now()) {
            tracing::warn!(task_id, error = %e, "failed to record audit comment: {text}");
            self.warnings.push(AuditFailure {
                task_id,
                text: text.to_string(),
                reason: e.to_string(),
            });
        }
    }

    /// Number of failures so far.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.warnings.len()
    }

    /// Wrap the operation's value.
    pub fn finish<T>(self, value: T) -> Applied<T> {
        Applied { value, warnings: self.warnings }
    }
}
