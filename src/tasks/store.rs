//! Tracker store trait and `SQLite` implementation.
//!
//! Every status-changing operation runs inside one `BEGIN IMMEDIATE` transaction:
//! mutate the child, reconcile the phase, recompute the task, commit. Validation,
//! lookup and guard failures return before anything is committed.

use crate::error::{EntityKind, Error, Result};
use crate::tasks::aggregate::{self, phase_change_text};
use crate::tasks::audit::{insert_comment, Applied, AuditTrail};
use crate::tasks::batch::{self, BatchAction, BatchItem, BatchOutcome};
use crate::tasks::guard;
use crate::tasks::models::{
    Author, Comment, NewPhase, NewTask, NewTodo, Notification, NotificationKind, Phase,
    PhaseDetail, PhaseStatus, Priority, Task, TaskDetail, TaskStatus, Todo, TodoStatus,
};
use crate::tasks::progress::{self, PhaseSnapshot};
use crate::traits::NotificationSink;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TASK_COLUMNS: &str = "id, name, description, priority, due_date, progress_percent, status, \
     interval_minutes, last_ping, agent_name, skills, context_tags, definition_of_done, created_at";

const PHASE_COLUMNS: &str = "id, task_id, name, description, status, sort_order, created_at";

const TODO_COLUMNS: &str = "id, phase_id, name, description, status, created_at";

const NOTIFICATION_COLUMNS: &str = "id, task_id, task_name, message, kind, is_read, created_at";

/// Trait for tracker storage operations.
///
/// All methods return a `Result` and may fail with database errors.
#[allow(clippy::missing_errors_doc)]
pub trait TrackerStore {
    // Tasks

    /// Create a task with its phases and todos.
    fn create_task(&self, new: NewTask) -> Result<Applied<TaskDetail>>;

    /// Get a task by id.
    fn get_task(&self, id: i64) -> Result<Option<Task>>;

    /// Get a task with its phases, todos and comments.
    fn get_task_detail(&self, id: i64) -> Result<TaskDetail>;

    /// List tasks matching a filter, oldest first.
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Edit descriptive fields. Progress and status are never touched.
    fn edit_task(&self, id: i64, edit: TaskEdit) -> Result<Task>;

    /// Delete a task with its phases, todos and comments.
    fn delete_task(&self, id: i64) -> Result<bool>;

    // Children

    /// Attach a new phase to a task.
    fn add_phase(&self, task_id: i64, phase: NewPhase) -> Result<Applied<PhaseDetail>>;

    /// Attach a new todo to a phase.
    fn add_todo(&self, phase_id: i64, todo: NewTodo) -> Result<Applied<Todo>>;

    // Status changes

    /// Set a todo's status and propagate it upwards.
    fn update_todo_status(&self, id: i64, status: TodoStatus) -> Result<Applied<Task>>;

    /// Set a phase's status manually.
    fn update_phase_status(&self, id: i64, status: PhaseStatus) -> Result<Applied<Task>>;

    /// Request a task status, subject to the completion guard.
    fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Applied<Task>>;

    /// Apply a batch report with a single trailing recompute.
    fn batch_report(&self, task_id: i64, items: &[BatchItem]) -> Result<Applied<BatchOutcome>>;

    /// Reconcile and recompute every task.
    fn recompute_all(&self) -> Result<Applied<RepairReport>>;

    // Comments

    /// Add a manual comment.
    fn add_comment(&self, task_id: i64, text: &str, author: Author) -> Result<Comment>;

    /// List a task's comments, oldest first.
    fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>>;

    // Pings

    /// In-progress tasks that have not pinged within their interval at `now`.
    fn stale_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Move `last_ping` to `now` if it still equals `seen` and the task is in progress.
    ///
    /// Returns false when another writer got there first.
    fn reset_ping(&self, task_id: i64, seen: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool>;

    // Notifications

    /// Record a notification about a task.
    fn add_notification(
        &self,
        task_id: i64,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification>;

    /// List notifications, newest first.
    fn list_notifications(&self, unread_only: bool, limit: usize) -> Result<Vec<Notification>>;

    /// Mark one notification read.
    fn mark_notification_read(&self, id: i64) -> Result<()>;

    /// Mark every notification read, returning how many changed.
    fn mark_all_notifications_read(&self) -> Result<usize>;

    /// Count unread notifications.
    fn unread_notification_count(&self) -> Result<u32>;
}

/// Filter options for listing tasks.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Filter by legacy status.
    pub status: Option<TaskStatus>,
    /// Filter by priority.
    pub priority: Option<Priority>,
}

/// Fields that can be edited on a task.
#[derive(Debug, Default, Clone)]
pub struct TaskEdit {
    /// New name (if Some).
    pub name: Option<String>,
    /// New description (if Some).
    pub description: Option<String>,
    /// New priority (if Some).
    pub priority: Option<Priority>,
    /// New reminder interval (if Some).
    pub interval_minutes: Option<u32>,
    /// New due date (if Some).
    pub due_date: Option<DateTime<Utc>>,
    /// New owning agent (if Some).
    pub agent_name: Option<String>,
    /// New skills (if Some).
    pub skills: Option<String>,
    /// New tags (if Some).
    pub context_tags: Option<String>,
    /// New acceptance criteria (if Some).
    pub definition_of_done: Option<String>,
}

impl TaskEdit {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.interval_minutes.is_none()
            && self.due_date.is_none()
            && self.agent_name.is_none()
            && self.skills.is_none()
            && self.context_tags.is_none()
            && self.definition_of_done.is_none()
    }
}

/// Result of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Tasks examined.
    pub examined: usize,
    /// Phases whose status was reconciled.
    pub phases_reconciled: usize,
    /// Tasks whose progress or status changed.
    pub tasks_changed: Vec<i64>,
}

/// SQLite-based tracker store.
#[derive(Debug, Clone)]
pub struct SqliteTrackerStore {
    db_path: PathBuf,
}

impl SqliteTrackerStore {
    /// Create a new `SQLite` tracker store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf() };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Start a transaction that holds the write lock from its first statement.
    fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>> {
        Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high', 'critical')),
                due_date TEXT,
                progress_percent INTEGER NOT NULL DEFAULT 0
                    CHECK (progress_percent >= 0 AND progress_percent <= 100),
                status TEXT NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'in_progress', 'done')),
                interval_minutes INTEGER CHECK (interval_minutes IS NULL OR interval_minutes > 0),
                last_ping TEXT NOT NULL,
                agent_name TEXT NOT NULL DEFAULT 'Main Agent',
                skills TEXT,
                context_tags TEXT,
                definition_of_done TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS phases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'not_started'
                    CHECK (status IN ('not_started', 'in_progress', 'completed', 'blocked')),
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phase_id INTEGER NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'in_progress', 'done')),
                created_at TEXT NOT NULL
            );

            -- Append-only; removed only with the owning task
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT 'system'
                    CHECK (author IN ('system', 'user', 'agent', 'sub-agent')),
                timestamp TEXT NOT NULL
            );

            -- Notifications outlive their task
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                task_name TEXT NOT NULL,
                message TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'reminder'
                    CHECK (kind IN ('reminder', 'completion', 'system')),
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_phases_task ON phases(task_id);
            CREATE INDEX IF NOT EXISTS idx_todos_phase ON todos(phase_id);
            CREATE INDEX IF NOT EXISTS idx_comments_task ON comments(task_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_task ON notifications(task_id, kind, is_read);
            ",
        )?;

        Ok(())
    }

    // Row parsing

    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        Ok(Task {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            priority: row.get(3)?,
            due_date: row.get(4)?,
            progress_percent: row.get(5)?,
            status: row.get(6)?,
            interval_minutes: row.get(7)?,
            last_ping: row.get(8)?,
            agent_name: row.get(9)?,
            skills: row.get(10)?,
            context_tags: row.get(11)?,
            definition_of_done: row.get(12)?,
            created_at: row.get(13)?,
        })
    }

    fn parse_phase(row: &rusqlite::Row) -> rusqlite::Result<Phase> {
        Ok(Phase {
            id: row.get(0)?,
            task_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            order: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn parse_todo(row: &rusqlite::Row) -> rusqlite::Result<Todo> {
        Ok(Todo {
            id: row.get(0)?,
            phase_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn parse_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            task_id: row.get(1)?,
            text: row.get(2)?,
            author: row.get(3)?,
            timestamp: row.get(4)?,
        })
    }

    fn parse_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
        Ok(Notification {
            id: row.get(0)?,
            task_id: row.get(1)?,
            task_name: row.get(2)?,
            message: row.get(3)?,
            kind: row.get(4)?,
            is_read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // Lookups

    fn find_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], Self::parse_task).optional()?)
    }

    fn require_task(conn: &Connection, id: i64) -> Result<Task> {
        Self::find_task(conn, id)?.ok_or(Error::not_found(EntityKind::Task, id))
    }

    fn require_phase(conn: &Connection, id: i64) -> Result<Phase> {
        let sql = format!("SELECT {PHASE_COLUMNS} FROM phases WHERE id = ?1");
        conn.query_row(&sql, params![id], Self::parse_phase)
            .optional()?
            .ok_or(Error::not_found(EntityKind::Phase, id))
    }

    fn require_todo(conn: &Connection, id: i64) -> Result<Todo> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1");
        conn.query_row(&sql, params![id], Self::parse_todo)
            .optional()?
            .ok_or(Error::not_found(EntityKind::Todo, id))
    }

    fn phases_of(conn: &Connection, task_id: i64) -> Result<Vec<Phase>> {
        let sql = format!("SELECT {PHASE_COLUMNS} FROM phases WHERE task_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let phases = stmt.query_map(params![task_id], Self::parse_phase)?;
        Ok(phases.collect::<rusqlite::Result<_>>()?)
    }

    fn todos_of(conn: &Connection, phase_id: i64) -> Result<Vec<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE phase_id = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let todos = stmt.query_map(params![phase_id], Self::parse_todo)?;
        Ok(todos.collect::<rusqlite::Result<_>>()?)
    }

    fn todo_statuses(conn: &Connection, phase_id: i64) -> Result<Vec<TodoStatus>> {
        let mut stmt = conn.prepare("SELECT status FROM todos WHERE phase_id = ?1 ORDER BY id")?;
        let statuses = stmt.query_map(params![phase_id], |row| row.get(0))?;
        Ok(statuses.collect::<rusqlite::Result<_>>()?)
    }

    fn comments_of(conn: &Connection, task_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = conn.prepare(
            "SELECT id, task_id, text, author, timestamp FROM comments
             WHERE task_id = ?1 ORDER BY id",
        )?;
        let comments = stmt.query_map(params![task_id], Self::parse_comment)?;
        Ok(comments.collect::<rusqlite::Result<_>>()?)
    }

    fn unread_reminders(conn: &Connection, task_id: i64) -> Result<u32> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM notifications
             WHERE task_id = ?1 AND kind = 'reminder' AND is_read = 0",
            params![task_id],
            |row| row.get(0),
        )?)
    }

    /// Phases of a task as the calculator and guard see them, in attachment order.
    fn snapshots(conn: &Connection, task_id: i64) -> Result<Vec<PhaseSnapshot>> {
        Self::phases_of(conn, task_id)?
            .into_iter()
            .map(|p| -> Result<PhaseSnapshot> {
                let todos = Self::todo_statuses(conn, p.id)?;
                Ok(PhaseSnapshot::new(p.name, p.status, todos))
            })
            .collect()
    }

    fn phase_detail(conn: &Connection, phase: Phase) -> Result<PhaseDetail> {
        let todos = Self::todos_of(conn, phase.id)?;
        Ok(PhaseDetail { phase, todos })
    }

    fn load_detail(conn: &Connection, id: i64) -> Result<TaskDetail> {
        let task = Self::require_task(conn, id)?;
        let phases = Self::phases_of(conn, id)?
            .into_iter()
            .map(|p| Self::phase_detail(conn, p))
            .collect::<Result<_>>()?;
        Ok(TaskDetail {
            task,
            phases,
            comments: Self::comments_of(conn, id)?,
            unread_reminder_count: Self::unread_reminders(conn, id)?,
        })
    }

    // Inserts

    fn insert_phase(conn: &Connection, task_id: i64, phase: &NewPhase) -> Result<i64> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO phases (task_id, name, description, status, sort_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![task_id, phase.name, phase.description, phase.status, phase.order, now],
        )?;
        let phase_id = conn.last_insert_rowid();
        for todo in &phase.todos {
            Self::insert_todo(conn, phase_id, todo)?;
        }
        Ok(phase_id)
    }

    fn insert_todo(conn: &Connection, phase_id: i64, todo: &NewTodo) -> Result<i64> {
        conn.execute(
            "INSERT INTO todos (phase_id, name, description, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![phase_id, todo.name, todo.description, todo.status, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_notification(
        conn: &Connection,
        task: &Task,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO notifications (task_id, task_name, message, kind, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![task.id, task.name, message, kind, now],
        )?;
        Ok(Notification {
            id: conn.last_insert_rowid(),
            task_id: task.id,
            task_name: task.name.clone(),
            message: message.to_string(),
            kind,
            is_read: false,
            created_at: now,
        })
    }

    // Propagation

    /// Bring a phase's status in line with its todos. Returns whether it changed.
    fn reconcile_phase(conn: &Connection, trail: &mut AuditTrail, phase: &Phase) -> Result<bool> {
        let todos = Self::todo_statuses(conn, phase.id)?;
        let Some(new) = aggregate::reconcile(phase.status, &todos) else {
            return Ok(false);
        };

        conn.execute("UPDATE phases SET status = ?1 WHERE id = ?2", params![new, phase.id])?;
        trail.record(
            conn,
            phase.task_id,
            &phase_change_text(&phase.name, phase.status, new),
            Author::System,
        );
        tracing::debug!(phase_id = phase.id, from = %phase.status, to = %new, "phase reconciled");
        Ok(true)
    }

    /// Store the derived progress and status, announcing a move into `done`.
    fn recompute_task(conn: &Connection, task_id: i64) -> Result<Task> {
        let mut task = Self::require_task(conn, task_id)?;
        let derived = progress::recompute(&Self::snapshots(conn, task_id)?);

        if derived.percent == task.progress_percent && derived.status == task.status {
            return Ok(task);
        }

        conn.execute(
            "UPDATE tasks SET progress_percent = ?1, status = ?2 WHERE id = ?3",
            params![derived.percent, derived.status, task_id],
        )?;

        if derived.status != task.status {
            tracing::info!(task_id, from = %task.status, to = %derived.status, "task status changed");
        }
        if derived.status == TaskStatus::Done && task.status != TaskStatus::Done {
            let message = Notification::completion_message(&task.name);
            Self::insert_notification(conn, &task, NotificationKind::Completion, &message)?;
        }

        task.progress_percent = derived.percent;
        task.status = derived.status;
        Ok(task)
    }

    fn cascade_phase_completed(conn: &Connection, phase_id: i64) -> Result<usize> {
        Ok(conn.execute(
            "UPDATE todos SET status = 'done' WHERE phase_id = ?1 AND status != 'done'",
            params![phase_id],
        )?)
    }

    fn cascade_task_done(conn: &Connection, task_id: i64) -> Result<()> {
        let phases = conn.execute(
            "UPDATE phases SET status = 'completed' WHERE task_id = ?1 AND status != 'completed'",
            params![task_id],
        )?;
        let todos = conn.execute(
            "UPDATE todos SET status = 'done'
             WHERE phase_id IN (SELECT id FROM phases WHERE task_id = ?1) AND status != 'done'",
            params![task_id],
        )?;
        tracing::debug!(task_id, phases, todos, "cascaded task completion");
        Ok(())
    }

    fn touch_ping(conn: &Connection, task_id: i64) -> Result<()> {
        conn.execute("UPDATE tasks SET last_ping = ?1 WHERE id = ?2", params![Utc::now(), task_id])?;
        Ok(())
    }

    fn set_todo_status(conn: &Connection, id: i64, status: TodoStatus) -> Result<()> {
        conn.execute("UPDATE todos SET status = ?1 WHERE id = ?2", params![status, id])?;
        Ok(())
    }

    fn set_phase_status(conn: &Connection, id: i64, status: PhaseStatus) -> Result<()> {
        conn.execute("UPDATE phases SET status = ?1 WHERE id = ?2", params![status, id])?;
        if status == PhaseStatus::Completed {
            Self::cascade_phase_completed(conn, id)?;
        }
        Ok(())
    }

    /// Todo and its phase, checking that both belong to `task_id`.
    fn owned_todo(conn: &Connection, task_id: i64, todo_id: i64) -> Result<(Todo, Phase)> {
        let todo = Self::require_todo(conn, todo_id)?;
        let phase = Self::require_phase(conn, todo.phase_id)?;
        if phase.task_id != task_id {
            return Err(Error::Validation(format!(
                "Todo {todo_id} does not belong to task {task_id}"
            )));
        }
        Ok((todo, phase))
    }

    fn owned_phase(conn: &Connection, task_id: i64, phase_id: i64) -> Result<Phase> {
        let phase = Self::require_phase(conn, phase_id)?;
        if phase.task_id != task_id {
            return Err(Error::Validation(format!(
                "Phase {phase_id} does not belong to task {task_id}"
            )));
        }
        Ok(phase)
    }
}

fn validate_new_task(new: &NewTask) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("Task name must not be empty".to_string()));
    }
    if new.interval_minutes == Some(0) {
        return Err(Error::Validation("interval_minutes must be positive".to_string()));
    }
    if new.phases.is_empty() {
        return Err(Error::Validation("Task must have at least one phase".to_string()));
    }
    for phase in &new.phases {
        if phase.todos.is_empty() {
            return Err(Error::Validation(format!(
                "Phase '{}' must have at least one todo",
                phase.name
            )));
        }
    }
    Ok(())
}

impl TrackerStore for SqliteTrackerStore {
    fn create_task(&self, new: NewTask) -> Result<Applied<TaskDetail>> {
        validate_new_task(&new)?;

        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let now = Utc::now();

        tx.execute(
            "INSERT INTO tasks (name, description, priority, due_date, progress_percent, status,
                interval_minutes, last_ping, agent_name, skills, context_tags, definition_of_done,
                created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 'todo', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                new.name,
                new.description,
                new.priority,
                new.due_date,
                new.interval_minutes,
                now,
                new.agent_name,
                new.skills,
                new.context_tags,
                new.definition_of_done,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for phase in &new.phases {
            let phase_id = Self::insert_phase(&tx, id, phase)?;
            Self::reconcile_phase(&tx, &mut trail, &Self::require_phase(&tx, phase_id)?)?;
        }

        Self::recompute_task(&tx, id)?;
        trail.record(&tx, id, &format!("Task '{}' created", new.name), Author::System);

        let detail = Self::load_detail(&tx, id)?;
        tx.commit()?;
        tracing::info!(task_id = id, phases = new.phases.len(), "task created");
        Ok(trail.finish(detail))
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.open()?;
        Self::find_task(&conn, id)
    }

    fn get_task_detail(&self, id: i64) -> Result<TaskDetail> {
        let conn = self.open()?;
        Self::load_detail(&conn, id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.open()?;

        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params_vec.push(Box::new(status));
        }

        if let Some(priority) = filter.priority {
            conditions.push("priority = ?");
            params_vec.push(Box::new(priority));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks {where_clause} ORDER BY id");

        let params: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(AsRef::as_ref).collect();
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map(params.as_slice(), Self::parse_task)?;
        Ok(tasks.collect::<rusqlite::Result<_>>()?)
    }

    fn edit_task(&self, id: i64, edit: TaskEdit) -> Result<Task> {
        if edit.interval_minutes == Some(0) {
            return Err(Error::Validation("interval_minutes must be positive".to_string()));
        }
        if edit.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::Validation("Task name must not be empty".to_string()));
        }

        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        Self::require_task(&tx, id)?;

        if edit.is_empty() {
            return Self::require_task(&tx, id);
        }

        // Build dynamic UPDATE statement
        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = edit.name {
            updates.push("name = ?");
            values.push(Box::new(name));
        }
        if let Some(description) = edit.description {
            updates.push("description = ?");
            values.push(Box::new(description));
        }
        if let Some(priority) = edit.priority {
            updates.push("priority = ?");
            values.push(Box::new(priority));
        }
        if let Some(interval) = edit.interval_minutes {
            updates.push("interval_minutes = ?");
            values.push(Box::new(interval));
        }
        if let Some(due_date) = edit.due_date {
            updates.push("due_date = ?");
            values.push(Box::new(due_date));
        }
        if let Some(agent_name) = edit.agent_name {
            updates.push("agent_name = ?");
            values.push(Box::new(agent_name));
        }
        if let Some(skills) = edit.skills {
            updates.push("skills = ?");
            values.push(Box::new(skills));
        }
        if let Some(tags) = edit.context_tags {
            updates.push("context_tags = ?");
            values.push(Box::new(tags));
        }
        if let Some(dod) = edit.definition_of_done {
            updates.push("definition_of_done = ?");
            values.push(Box::new(dod));
        }

        values.push(Box::new(id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", updates.join(", "));
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        tx.execute(&sql, params.as_slice())?;

        let task = Self::require_task(&tx, id)?;
        tx.commit()?;
        tracing::debug!(task_id = id, fields = updates.len(), "task edited");
        Ok(task)
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        let conn = self.open()?;
        let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(task_id = id, "task deleted");
        }
        Ok(rows > 0)
    }

    fn add_phase(&self, task_id: i64, phase: NewPhase) -> Result<Applied<PhaseDetail>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        Self::require_task(&tx, task_id)?;

        let phase_id = Self::insert_phase(&tx, task_id, &phase)?;
        trail.record(&tx, task_id, &format!("Phase '{}' added", phase.name), Author::System);
        Self::reconcile_phase(&tx, &mut trail, &Self::require_phase(&tx, phase_id)?)?;
        Self::recompute_task(&tx, task_id)?;

        let detail = Self::phase_detail(&tx, Self::require_phase(&tx, phase_id)?)?;
        tx.commit()?;
        Ok(trail.finish(detail))
    }

    fn add_todo(&self, phase_id: i64, todo: NewTodo) -> Result<Applied<Todo>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let phase = Self::require_phase(&tx, phase_id)?;

        let todo_id = Self::insert_todo(&tx, phase_id, &todo)?;
        trail.record(
            &tx,
            phase.task_id,
            &format!("Todo '{}' added to phase '{}'", todo.name, phase.name),
            Author::System,
        );
        Self::reconcile_phase(&tx, &mut trail, &phase)?;
        Self::recompute_task(&tx, phase.task_id)?;

        let created = Self::require_todo(&tx, todo_id)?;
        tx.commit()?;
        Ok(trail.finish(created))
    }

    fn update_todo_status(&self, id: i64, status: TodoStatus) -> Result<Applied<Task>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let todo = Self::require_todo(&tx, id)?;
        let phase = Self::require_phase(&tx, todo.phase_id)?;

        Self::set_todo_status(&tx, id, status)?;
        trail.record(
            &tx,
            phase.task_id,
            &format!("Todo '{}' status changed from '{}' to '{status}'", todo.name, todo.status),
            Author::System,
        );
        Self::reconcile_phase(&tx, &mut trail, &phase)?;
        let task = Self::recompute_task(&tx, phase.task_id)?;

        tx.commit()?;
        Ok(trail.finish(task))
    }

    fn update_phase_status(&self, id: i64, status: PhaseStatus) -> Result<Applied<Task>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let phase = Self::require_phase(&tx, id)?;

        Self::set_phase_status(&tx, id, status)?;
        trail.record(
            &tx,
            phase.task_id,
            &phase_change_text(&phase.name, phase.status, status),
            Author::System,
        );
        let task = Self::recompute_task(&tx, phase.task_id)?;

        tx.commit()?;
        Ok(trail.finish(task))
    }

    fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Applied<Task>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let task = Self::require_task(&tx, id)?;

        let phases = Self::snapshots(&tx, id)?;
        if let Err(blocked) = guard::guard_transition(task.status, status, &phases) {
            tracing::info!(task_id = id, incomplete = blocked.incomplete, "completion blocked");
            return Err(blocked.into());
        }

        Self::touch_ping(&tx, id)?;
        trail.record(&tx, id, &format!("Task status updated to '{status}'"), Author::System);
        if status == TaskStatus::Done && task.status != TaskStatus::Done {
            Self::cascade_task_done(&tx, id)?;
        }
        let task = Self::recompute_task(&tx, id)?;

        tx.commit()?;
        Ok(trail.finish(task))
    }

    fn batch_report(&self, task_id: i64, items: &[BatchItem]) -> Result<Applied<BatchOutcome>> {
        let actions = batch::plan(items)?;

        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        Self::require_task(&tx, task_id)?;

        let mut comments_added = 0;
        let mut todos_updated = 0;
        let mut phases_updated = 0;
        let mut task_status_set = false;

        for action in actions {
            match action {
                BatchAction::Comment { text, author } => {
                    insert_comment(&tx, task_id, &text, author, Utc::now())?;
                    comments_added += 1;
                }
                BatchAction::Todo { id, status } => {
                    let (todo, phase) = Self::owned_todo(&tx, task_id, id)?;
                    Self::set_todo_status(&tx, id, status)?;
                    Self::reconcile_phase(&tx, &mut trail, &phase)?;
                    let text =
                        format!("Todo '{}' status updated to '{status}' via batch report", todo.name);
                    trail.record(&tx, task_id, &text, Author::System);
                    todos_updated += 1;
                }
                BatchAction::Phase { id, status } => {
                    let phase = Self::owned_phase(&tx, task_id, id)?;
                    Self::set_phase_status(&tx, id, status)?;
                    let text = format!(
                        "Phase '{}' status updated to '{status}' via batch report",
                        phase.name
                    );
                    trail.record(&tx, task_id, &text, Author::System);
                    phases_updated += 1;
                }
                BatchAction::TaskStatus(status) => {
                    // Stored status lags until the trailing recompute, so derive it here.
                    let current = progress::recompute(&Self::snapshots(&tx, task_id)?).status;
                    Self::touch_ping(&tx, task_id)?;
                    trail.record(
                        &tx,
                        task_id,
                        &format!("Task status updated to '{status}' via batch report"),
                        Author::System,
                    );
                    if status == TaskStatus::Done && current != TaskStatus::Done {
                        Self::cascade_task_done(&tx, task_id)?;
                    }
                    task_status_set = true;
                }
            }
        }

        let task = Self::recompute_task(&tx, task_id)?;
        tx.commit()?;
        tracing::debug!(task_id, items = items.len(), "batch report applied");

        Ok(trail.finish(BatchOutcome {
            task,
            comments_added,
            todos_updated,
            phases_updated,
            task_status_set,
        }))
    }

    fn recompute_all(&self) -> Result<Applied<RepairReport>> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let mut trail = AuditTrail::new();
        let mut report = RepairReport::default();

        let ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM tasks ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        for id in ids {
            let before = Self::require_task(&tx, id)?;
            for phase in Self::phases_of(&tx, id)? {
                if Self::reconcile_phase(&tx, &mut trail, &phase)? {
                    report.phases_reconciled += 1;
                }
            }
            let after = Self::recompute_task(&tx, id)?;
            if (after.progress_percent, after.status) != (before.progress_percent, before.status) {
                report.tasks_changed.push(id);
            }
            report.examined += 1;
        }

        tx.commit()?;
        tracing::info!(
            examined = report.examined,
            changed = report.tasks_changed.len(),
            "recomputed all tasks"
        );
        Ok(trail.finish(report))
    }

    fn add_comment(&self, task_id: i64, text: &str, author: Author) -> Result<Comment> {
        if text.trim().is_empty() {
            return Err(Error::Validation("Comment text must not be empty".to_string()));
        }
        let conn = self.open()?;
        Self::require_task(&conn, task_id)?;
        Ok(insert_comment(&conn, task_id, text, author, Utc::now())?)
    }

    fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>> {
        let conn = self.open()?;
        Self::require_task(&conn, task_id)?;
        Self::comments_of(&conn, task_id)
    }

    fn stale_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = self.open()?;
        let sql =
            format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'in_progress' ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map([], Self::parse_task)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks.into_iter().filter(|t| t.is_stale(now)).collect())
    }

    fn reset_ping(&self, task_id: i64, seen: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.open()?;
        let tx = Self::write_tx(&mut conn)?;
        let rows = tx.execute(
            "UPDATE tasks SET last_ping = ?1
             WHERE id = ?2 AND last_ping = ?3 AND status = 'in_progress'",
            params![now, task_id, seen],
        )?;
        tx.commit()?;
        Ok(rows == 1)
    }

    fn add_notification(
        &self,
        task_id: i64,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification> {
        let conn = self.open()?;
        let task = Self::require_task(&conn, task_id)?;
        Self::insert_notification(&conn, &task, kind, message)
    }

    fn list_notifications(&self, unread_only: bool, limit: usize) -> Result<Vec<Notification>> {
        let conn = self.open()?;
        let filter = if unread_only { "WHERE is_read = 0" } else { "" };
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications {filter}
             ORDER BY id DESC LIMIT ?1"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&sql)?;
        let notifications = stmt.query_map(params![limit], Self::parse_notification)?;
        Ok(notifications.collect::<rusqlite::Result<_>>()?)
    }

    fn mark_notification_read(&self, id: i64) -> Result<()> {
        let conn = self.open()?;
        let rows = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found(EntityKind::Notification, id));
        }
        Ok(())
    }

    fn mark_all_notifications_read(&self) -> Result<usize> {
        let conn = self.open()?;
        Ok(conn.execute("UPDATE notifications SET is_read = 1 WHERE is_read = 0", [])?)
    }

    fn unread_notification_count(&self) -> Result<u32> {
        let conn = self.open()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM notifications WHERE is_read = 0", [], |row| {
            row.get(0)
        })?)
    }
}

impl NotificationSink for SqliteTrackerStore {
    fn send_reminder(&self, task: &Task) -> Result<Notification> {
        let conn = self.open()?;
        let message = Notification::reminder_message(task.id, &task.name);
        Self::insert_notification(&conn, task, NotificationKind::Reminder, &message)
    }
}
