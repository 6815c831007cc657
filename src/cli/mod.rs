//! Hierarchical CLI for the status tracker.
//!
//! Two-level commands for tasks, phases, todos, comments and notifications,
//! plus the batch report, the stale-task worker and a few utilities. Results are
//! printed as JSON on stdout.

mod items;
mod run;

#[cfg(test)]
mod tests;

pub use items::{CommentCommand, NotificationsCommand, PhaseCommand, TaskCommand, TodoCommand};
pub use run::{run, CliOutput, Settings};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Status tracker - hierarchical tasks with derived progress.
///
/// For detailed help on any command group, use:
///   status-tracker <command> --help
#[derive(Parser, Debug)]
#[command(name = "status-tracker")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file (overrides STATUS_TRACKER_DB and the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Data directory holding config.yaml and the default database
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Task management - create, inspect, edit and finish tasks.
    ///
    /// A task's progress and status are always derived from its phases;
    /// they cannot be set directly.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Phase management - add phases and set their status.
    #[command(subcommand)]
    Phase(PhaseCommand),

    /// Todo management - add checklist items and set their status.
    #[command(subcommand)]
    Todo(TodoCommand),

    /// Comments on a task.
    #[command(subcommand)]
    Comment(CommentCommand),

    /// Apply a batch report to a task (stdin: JSON array of items).
    ///
    /// Items may carry `comment` (+ `author`), `todo_id` + `status`,
    /// `phase_id` + `status` and `task_status`. The whole batch is applied
    /// atomically with a single recompute at the end.
    Batch {
        /// Task ID
        task_id: i64,
    },

    /// Notifications produced by reminders and completions.
    #[command(subcommand)]
    Notifications(NotificationsCommand),

    /// Remind about in-progress tasks that have stopped pinging.
    Worker {
        /// Run a single pass and print what it did
        #[arg(long)]
        once: bool,
    },

    /// Reconcile phase statuses and recompute every task.
    Repair,

    // === Utility Commands ===
    /// Ensure the config file exists (create with defaults if not).
    #[command(name = "ensure-config")]
    EnsureConfig,

    /// Show version information.
    Version,
}

impl Command {
    /// Returns true if this command requires stdin input.
    #[must_use]
    pub const fn needs_stdin(&self) -> bool {
        matches!(self, Self::Task(TaskCommand::Create) | Self::Batch { .. })
    }
}
