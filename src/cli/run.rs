//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output.

use crate::cli::{
    Command, CommentCommand, NotificationsCommand, PhaseCommand, TaskCommand, TodoCommand,
};
use crate::config::{self, TrackerConfig};
use crate::error::{EntityKind, Error, Result};
use crate::notifier::Notifier;
use crate::paths;
use crate::tasks::batch;
use crate::tasks::{
    Applied, NewPhase, NewTask, NewTodo, Priority, SqliteTrackerStore, Task, TaskEdit, TaskFilter,
    TaskStatus, TodoStatus, TrackerStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Exit code when the completion guard refuses a transition.
const GUARD_EXIT_CODE: u8 = 2;

/// Where the CLI finds its data.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `config.yaml`.
    pub data_dir: PathBuf,
    /// Database file in use.
    pub db_path: PathBuf,
    /// Loaded configuration.
    pub config: TrackerConfig,
}

impl Settings {
    /// Resolve settings from command-line overrides.
    ///
    /// The data directory defaults to `~/.status-tracker`. The database is taken from
    /// `db`, then `STATUS_TRACKER_DB`, then the config file, then the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn resolve(data_dir: Option<PathBuf>, db: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(paths::data_dir)
            .unwrap_or_else(|| PathBuf::from(".status-tracker"));
        let config = TrackerConfig::load_or_default(&data_dir)?;
        let explicit = db.or_else(config::db_path_from_env);
        let db_path = config.resolve_db_path(explicit.as_deref(), &data_dir);
        Ok(Self { data_dir, db_path, config })
    }
}

/// Run a CLI command with the given stdin input.
pub fn run(command: Command, settings: &Settings, stdin: &str) -> CliOutput {
    match command {
        Command::Version => run_version(),
        Command::EnsureConfig => run_ensure_config(settings),
        Command::Task(cmd) => with_store(settings, |store| run_task_cmd(store, cmd, stdin)),
        Command::Phase(cmd) => with_store(settings, |store| run_phase_cmd(store, cmd)),
        Command::Todo(cmd) => with_store(settings, |store| run_todo_cmd(store, cmd)),
        Command::Comment(cmd) => with_store(settings, |store| run_comment_cmd(store, cmd)),
        Command::Batch { task_id } => {
            with_store(settings, |store| run_batch(store, task_id, stdin))
        }
        Command::Notifications(cmd) => with_store(settings, |store| {
            run_notifications_cmd(store, cmd, settings.config.notification_limit)
        }),
        Command::Worker { once } => with_store(settings, |store| run_worker(store, settings, once)),
        Command::Repair => with_store(settings, |store| applied_output(store.recompute_all())),
    }
}

// === Utility Commands ===

fn run_version() -> CliOutput {
    CliOutput {
        exit_code: ExitCode::SUCCESS,
        stdout: vec![],
        stderr: vec![format!("status-tracker v{}", crate::VERSION)],
    }
}

fn run_ensure_config(settings: &Settings) -> CliOutput {
    match config::ensure_config_in(&settings.data_dir) {
        Ok(config) => {
            let path = paths::config_path_in(&settings.data_dir);
            let messages = vec![
                format!("Config ensured at {}", path.display()),
                format!(
                    "  database: {}",
                    config.resolve_db_path(None, &settings.data_dir).display()
                ),
                format!("  worker_poll_seconds: {}", config.worker_poll_seconds),
                format!("  notification_limit: {}", config.notification_limit),
            ];
            CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: messages }
        }
        Err(e) => error_output(&e),
    }
}

// === Task Commands ===

fn run_task_cmd(store: &SqliteTrackerStore, cmd: TaskCommand, stdin: &str) -> CliOutput {
    match cmd {
        TaskCommand::Create => task_create(store, stdin),
        TaskCommand::Get { id } => result_output(store.get_task_detail(id)),
        TaskCommand::List { status, priority } => {
            task_list(store, &TaskFilter { status, priority })
        }
        TaskCommand::Edit {
            id,
            name,
            description,
            priority,
            interval_minutes,
            due_date,
            agent_name,
            skills,
            context_tags,
            definition_of_done,
        } => {
            let edit = TaskEdit {
                name,
                description,
                priority,
                interval_minutes,
                due_date,
                agent_name,
                skills,
                context_tags,
                definition_of_done,
            };
            result_output(store.edit_task(id, edit))
        }
        TaskCommand::Delete { id } => task_delete(store, id),
        TaskCommand::Status { id, status } => applied_output(store.update_task_status(id, status)),
    }
}

fn task_create(store: &SqliteTrackerStore, stdin: &str) -> CliOutput {
    let new: NewTask = match serde_json::from_str(stdin) {
        Ok(new) => new,
        Err(e) => return error_output(&Error::Json(e)),
    };
    applied_output(store.create_task(new))
}

fn task_list(store: &SqliteTrackerStore, filter: &TaskFilter) -> CliOutput {
    match store.list_tasks(filter) {
        Ok(tasks) => {
            let summaries: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
            json_output(&summaries)
        }
        Err(e) => error_output(&e),
    }
}

fn task_delete(store: &SqliteTrackerStore, id: i64) -> CliOutput {
    match store.delete_task(id) {
        Ok(true) => success_output(format!("Deleted task {id}")),
        Ok(false) => error_output(&Error::not_found(EntityKind::Task, id)),
        Err(e) => error_output(&e),
    }
}

// === Phase and Todo Commands ===

fn run_phase_cmd(store: &SqliteTrackerStore, cmd: PhaseCommand) -> CliOutput {
    match cmd {
        PhaseCommand::Add { task_id, name, description, order, todos } => {
            let mut phase = NewPhase::named(name);
            phase.description = description;
            phase.order = order;
            for todo in todos {
                phase = phase.with_todo(todo, TodoStatus::Todo);
            }
            applied_output(store.add_phase(task_id, phase))
        }
        PhaseCommand::Status { id, status } => applied_output(store.update_phase_status(id, status)),
    }
}

fn run_todo_cmd(store: &SqliteTrackerStore, cmd: TodoCommand) -> CliOutput {
    match cmd {
        TodoCommand::Add { phase_id, name, description, status } => {
            applied_output(store.add_todo(phase_id, NewTodo { name, description, status }))
        }
        TodoCommand::Status { id, status } => applied_output(store.update_todo_status(id, status)),
    }
}

// === Comments ===

fn run_comment_cmd(store: &SqliteTrackerStore, cmd: CommentCommand) -> CliOutput {
    match cmd {
        CommentCommand::Add { task_id, text, author } => {
            result_output(store.add_comment(task_id, &text, author))
        }
        CommentCommand::List { task_id } => result_output(store.list_comments(task_id)),
    }
}

// === Batch ===

fn run_batch(store: &SqliteTrackerStore, task_id: i64, stdin: &str) -> CliOutput {
    match batch::parse_items(stdin) {
        Ok(items) => applied_output(store.batch_report(task_id, &items)),
        Err(e) => error_output(&e),
    }
}

// === Notifications ===

fn run_notifications_cmd(
    store: &SqliteTrackerStore,
    cmd: NotificationsCommand,
    default_limit: usize,
) -> CliOutput {
    match cmd {
        NotificationsCommand::List { unread, limit } => {
            result_output(store.list_notifications(unread, limit.unwrap_or(default_limit)))
        }
        NotificationsCommand::Read { id } => match store.mark_notification_read(id) {
            Ok(()) => success_output(format!("Marked notification {id} as read")),
            Err(e) => error_output(&e),
        },
        NotificationsCommand::ReadAll => match store.mark_all_notifications_read() {
            Ok(count) => success_output(format!("Marked {count} notification(s) as read")),
            Err(e) => error_output(&e),
        },
        NotificationsCommand::Count => match store.unread_notification_count() {
            Ok(count) => success_output(count.to_string()),
            Err(e) => error_output(&e),
        },
    }
}

// === Worker ===

fn run_worker(store: &SqliteTrackerStore, settings: &Settings, once: bool) -> CliOutput {
    let notifier = Notifier::new(store, store);
    if once {
        return result_output(notifier.check_and_notify(Utc::now()));
    }

    let stop = AtomicBool::new(false);
    let passes = notifier.run(settings.config.poll_interval(), &stop);
    success_output(format!("Worker stopped after {passes} pass(es)"))
}

// === Helpers ===

fn with_store(settings: &Settings, f: impl FnOnce(&SqliteTrackerStore) -> CliOutput) -> CliOutput {
    match SqliteTrackerStore::new(&settings.db_path) {
        Ok(store) => {
            tracing::debug!(db = %settings.db_path.display(), "opened store");
            f(&store)
        }
        Err(e) => error_output(&e),
    }
}

fn result_output<T: Serialize>(result: Result<T>) -> CliOutput {
    match result {
        Ok(value) => json_output(&value),
        Err(e) => error_output(&e),
    }
}

/// JSON for the value; each failed audit comment becomes a warning on stderr.
fn applied_output<T: Serialize>(result: Result<Applied<T>>) -> CliOutput {
    match result {
        Ok(applied) => {
            let mut output = json_output(&applied.value);
            output.stderr.extend(applied.warnings.iter().map(|w| format!("Warning: {w}")));
            output
        }
        Err(e) => error_output(&e),
    }
}

fn json_output<T: Serialize>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(&Error::Json(e)),
    }
}

fn success_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
}

fn error_output(error: &Error) -> CliOutput {
    let code = match error {
        Error::CompletionBlocked(_) => GUARD_EXIT_CODE,
        _ => 1,
    };
    CliOutput { exit_code: ExitCode::from(code), stdout: vec![], stderr: vec![error.to_string()] }
}

// === Output Types ===

/// Task summary for list operations.
#[derive(Debug, Serialize)]
struct TaskSummary {
    id: i64,
    name: String,
    status: TaskStatus,
    priority: Priority,
    progress_percent: u8,
    agent_name: String,
    last_ping: DateTime<Utc>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            status: task.status,
            priority: task.priority,
            progress_percent: task.progress_percent,
            agent_name: task.agent_name.clone(),
            last_ping: task.last_ping,
        }
    }
}
