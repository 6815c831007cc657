//! Task, phase, todo, comment and notification subcommands.

use crate::tasks::models::{Author, PhaseStatus, Priority, TaskStatus, TodoStatus};
use chrono::{DateTime, Utc};
use clap::Subcommand;

/// Task management commands.
///
/// ## Quick Start
///
/// ```bash
/// # Create a task from JSON
/// echo '{"name": "Ship", "phases": [{"name": "Build", "todos": [{"name": "Compile"}]}]}' \
///     | status-tracker task create
///
/// # See it with its phases, todos and comments
/// status-tracker task get 1
///
/// # Ask to mark it done (refused while todos are open)
/// status-tracker task status 1 done
/// ```
#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Create a task (stdin: JSON with name, phases and todos).
    ///
    /// Every task needs at least one phase and every phase at least one todo.
    Create,

    /// Get a task with its phases, todos and comments.
    Get {
        /// Task ID
        id: i64,
    },

    /// List tasks with optional filters.
    List {
        /// Filter by status: todo, in_progress, done
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// Filter by priority: low, medium, high, critical
        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Edit a task's descriptive fields.
    ///
    /// Only specified fields are updated; others remain unchanged.
    Edit {
        /// Task ID
        id: i64,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New priority: low, medium, high, critical
        #[arg(long)]
        priority: Option<Priority>,

        /// New reminder interval in minutes
        #[arg(long)]
        interval_minutes: Option<u32>,

        /// New due date (RFC 3339)
        #[arg(long)]
        due_date: Option<DateTime<Utc>>,

        /// New owning agent
        #[arg(long)]
        agent_name: Option<String>,

        /// New skills
        #[arg(long)]
        skills: Option<String>,

        /// New comma-separated tags
        #[arg(long)]
        context_tags: Option<String>,

        /// New acceptance criteria
        #[arg(long)]
        definition_of_done: Option<String>,
    },

    /// Delete a task with its phases, todos and comments.
    Delete {
        /// Task ID
        id: i64,
    },

    /// Request a task status.
    ///
    /// `done` is refused while any todo is open; on success every phase and
    /// todo is completed. Every request refreshes the task's ping.
    Status {
        /// Task ID
        id: i64,

        /// Requested status: todo, in_progress, done
        status: TaskStatus,
    },
}

/// Phase commands.
#[derive(Subcommand, Debug, Clone)]
pub enum PhaseCommand {
    /// Add a phase to a task.
    Add {
        /// Task ID
        task_id: i64,

        /// Phase name
        #[arg(short, long)]
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Display order
        #[arg(long, default_value = "0")]
        order: i64,

        /// Todo to create in the phase (repeatable)
        #[arg(long = "todo")]
        todos: Vec<String>,
    },

    /// Set a phase's status.
    ///
    /// `completed` marks every todo done; `blocked` pins the phase until it is
    /// set to something else.
    Status {
        /// Phase ID
        id: i64,

        /// New status: not_started, in_progress, completed, blocked
        status: PhaseStatus,
    },
}

/// Todo commands.
#[derive(Subcommand, Debug, Clone)]
pub enum TodoCommand {
    /// Add a todo to a phase.
    Add {
        /// Phase ID
        phase_id: i64,

        /// Todo name
        #[arg(short, long)]
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Initial status: todo, in_progress, done
        #[arg(short, long, default_value = "todo")]
        status: TodoStatus,
    },

    /// Set a todo's status.
    Status {
        /// Todo ID
        id: i64,

        /// New status: todo, in_progress, done
        status: TodoStatus,
    },
}

/// Comment commands.
#[derive(Subcommand, Debug, Clone)]
pub enum CommentCommand {
    /// Add a comment to a task.
    Add {
        /// Task ID
        task_id: i64,

        /// Comment text
        text: String,

        /// Author: system, user, agent, sub-agent
        #[arg(short, long, default_value = "user")]
        author: Author,
    },

    /// List a task's comments, oldest first.
    List {
        /// Task ID
        task_id: i64,
    },
}

/// Notification commands.
#[derive(Subcommand, Debug, Clone)]
pub enum NotificationsCommand {
    /// List notifications, newest first.
    List {
        /// Only unread notifications
        #[arg(short, long)]
        unread: bool,

        /// Maximum number to return (defaults to the configured limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Mark one notification read.
    Read {
        /// Notification ID
        id: i64,
    },

    /// Mark every notification read.
    #[command(name = "read-all")]
    ReadAll,

    /// Count unread notifications.
    Count,
}
