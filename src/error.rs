//! Error types for `status_tracker`.

use crate::tasks::guard::CompletionBlocked;
use crate::tasks::models::ParseEnumError;

/// Kinds of entity that can be looked up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A task.
    Task,
    /// A phase of a task.
    Phase,
    /// A checklist item inside a phase.
    Todo,
    /// A comment on a task.
    Comment,
    /// A notification.
    Notification,
}

impl EntityKind {
    /// Lowercase name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Phase => "phase",
            Self::Todo => "todo",
            Self::Comment => "comment",
            Self::Notification => "notification",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while tracking tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The request is structurally invalid; nothing was persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was being looked up.
        kind: EntityKind,
        /// The id that was not found.
        id: i64,
    },

    /// The completion guard refused a transition to `done`.
    #[error("{0}")]
    CompletionBlocked(#[from] CompletionBlocked),

    /// A status, priority or author string was not recognised.
    #[error("{0}")]
    InvalidValue(#[from] ParseEnumError),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`].
    #[must_use]
    pub const fn not_found(kind: EntityKind, id: i64) -> Self {
        Self::NotFound { kind, id }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
