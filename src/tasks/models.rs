//! Model types for the task tracker.

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reminder interval used when a task has none recorded.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Agent name recorded when a task is created without one.
pub const DEFAULT_AGENT_NAME: &str = "Main Agent";

/// Error when a string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}' (must be one of: {expected})")]
pub struct ParseEnumError {
    /// Which kind of value was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Comma-separated list of accepted values.
    pub expected: &'static str,
}

/// Implements `Display`, `ToSql` and `FromSql` for an enum with `as_str` and `FromStr`.
macro_rules! text_column {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// Task priority levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal work (default).
    #[default]
    Medium,
    /// Should be done soon.
    High,
    /// Stop everything.
    Critical,
}

impl Priority {
    /// Get the string representation of the priority.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
                expected: "low, medium, high, critical",
            }),
        }
    }
}

text_column!(Priority);

/// Legacy task status, derived from progress percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No progress yet.
    #[default]
    Todo,
    /// Some progress, not finished.
    InProgress,
    /// Progress reached 100%.
    Done,
}

impl TaskStatus {
    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                kind: "task status",
                value: s.to_string(),
                expected: "todo, in_progress, done",
            }),
        }
    }
}

text_column!(TaskStatus);

/// Phase status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// No todo has started.
    #[default]
    NotStarted,
    /// At least one todo has started or finished.
    InProgress,
    /// Every todo is done.
    Completed,
    /// Manually pinned; todo changes never overwrite it.
    Blocked,
}

impl PhaseStatus {
    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for PhaseStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(ParseEnumError {
                kind: "phase status",
                value: s.to_string(),
                expected: "not_started, in_progress, completed, blocked",
            }),
        }
    }
}

text_column!(PhaseStatus);

/// Checklist item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TodoStatus {
    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Whether the item is finished.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl FromStr for TodoStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                kind: "todo status",
                value: s.to_string(),
                expected: "todo, in_progress, done",
            }),
        }
    }
}

text_column!(TodoStatus);

/// Who wrote a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Author {
    /// Generated by the tracker itself.
    #[default]
    System,
    /// A human.
    User,
    /// The main agent.
    Agent,
    /// A delegated sub-agent (batch reports default to this).
    SubAgent,
}

impl Author {
    /// Get the string representation of the author.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Agent => "agent",
            Self::SubAgent => "sub-agent",
        }
    }
}

impl FromStr for Author {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "sub-agent" | "sub_agent" | "subagent" => Ok(Self::SubAgent),
            _ => Err(ParseEnumError {
                kind: "author",
                value: s.to_string(),
                expected: "system, user, agent, sub-agent",
            }),
        }
    }
}

text_column!(Author);

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// An in-progress task has not pinged within its interval.
    #[default]
    Reminder,
    /// A task reached 100%.
    Completion,
    /// Anything else.
    System,
}

impl NotificationKind {
    /// Get the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Completion => "completion",
            Self::System => "system",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reminder" => Ok(Self::Reminder),
            "completion" => Ok(Self::Completion),
            "system" => Ok(Self::System),
            _ => Err(ParseEnumError {
                kind: "notification kind",
                value: s.to_string(),
                expected: "reminder, completion, system",
            }),
        }
    }
}

text_column!(NotificationKind);

/// A tracked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: i64,
    /// Short name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Priority level.
    pub priority: Priority,
    /// When the task is due.
    pub due_date: Option<DateTime<Utc>>,
    /// Derived 0-100 progress. Never set directly.
    pub progress_percent: u8,
    /// Derived legacy status label.
    pub status: TaskStatus,
    /// Minutes between reminders while in progress. `None` means the default.
    pub interval_minutes: Option<u32>,
    /// Last liveness signal.
    pub last_ping: DateTime<Utc>,
    /// Agent that owns the task.
    pub agent_name: String,
    /// Skills the work needs.
    pub skills: Option<String>,
    /// Comma-separated tags.
    pub context_tags: Option<String>,
    /// Acceptance criteria.
    pub definition_of_done: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Reminder interval, falling back to [`DEFAULT_INTERVAL_MINUTES`].
    #[must_use]
    pub fn effective_interval_minutes(&self) -> u32 {
        self.interval_minutes.unwrap_or(DEFAULT_INTERVAL_MINUTES)
    }

    /// Whether an in-progress task has gone quiet for longer than its interval at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::InProgress
            && now > self.last_ping + Duration::minutes(i64::from(self.effective_interval_minutes()))
    }
}

/// A stage of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Unique identifier.
    pub id: i64,
    /// Owning task.
    pub task_id: i64,
    /// Phase name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Current status.
    pub status: PhaseStatus,
    /// Display order among siblings. Does not affect progress weight.
    pub order: i64,
    /// When the phase was created.
    pub created_at: DateTime<Utc>,
}

/// A checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier.
    pub id: i64,
    /// Owning phase.
    pub phase_id: i64,
    /// Item name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Current status.
    pub status: TodoStatus,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
}

/// An append-only comment on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: i64,
    /// Owning task.
    pub task_id: i64,
    /// Comment text.
    pub text: String,
    /// Who wrote it.
    pub author: Author,
    /// When it was written.
    pub timestamp: DateTime<Utc>,
}

/// A phase together with its todos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDetail {
    /// The phase.
    #[serde(flatten)]
    pub phase: Phase,
    /// Its todos, in creation order.
    pub todos: Vec<Todo>,
}

/// A task with its whole hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    /// The task.
    #[serde(flatten)]
    pub task: Task,
    /// Phases in attachment order.
    pub phases: Vec<PhaseDetail>,
    /// Comments, oldest first.
    pub comments: Vec<Comment>,
    /// Unread reminder notifications for this task.
    pub unread_reminder_count: u32,
}

impl TaskDetail {
    /// Find a phase by name.
    #[must_use]
    pub fn phase_named(&self, name: &str) -> Option<&PhaseDetail> {
        self.phases.iter().find(|p| p.phase.name == name)
    }

    /// Iterate over every todo in the task.
    pub fn todos(&self) -> impl Iterator<Item = &Todo> {
        self.phases.iter().flat_map(|p| p.todos.iter())
    }
}

/// A notification produced for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: i64,
    /// Task the notification is about.
    pub task_id: i64,
    /// Task name at the time of the notification.
    pub task_name: String,
    /// Human-readable message.
    pub message: String,
    /// What kind of notification this is.
    pub kind: NotificationKind,
    /// Whether it has been read.
    pub is_read: bool,
    /// When it was created.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Text of a stale-task reminder.
    #[must_use]
    pub fn reminder_message(task_id: i64, task_name: &str) -> String {
        format!("Task '{task_name}' (ID: {task_id}) is still in progress and needs attention!")
    }

    /// Text of a completion notice.
    #[must_use]
    pub fn completion_message(task_name: &str) -> String {
        format!("Task '{task_name}' has been completed!")
    }
}

const fn default_interval() -> Option<u32> {
    Some(DEFAULT_INTERVAL_MINUTES)
}

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Task name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Reminder interval in minutes.
    #[serde(default = "default_interval")]
    pub interval_minutes: Option<u32>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Owning agent.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    /// Skills.
    #[serde(default)]
    pub skills: Option<String>,
    /// Tags.
    #[serde(default)]
    pub context_tags: Option<String>,
    /// Acceptance criteria.
    #[serde(default)]
    pub definition_of_done: Option<String>,
    /// Phases, each with at least one todo.
    #[serde(default)]
    pub phases: Vec<NewPhase>,
}

impl NewTask {
    /// A task with the given name and defaults everywhere else.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval_minutes: default_interval(),
            agent_name: default_agent_name(),
            ..Self::default()
        }
    }

    /// Append a phase.
    #[must_use]
    pub fn with_phase(mut self, phase: NewPhase) -> Self {
        self.phases.push(phase);
        self
    }
}

/// Input for creating a phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhase {
    /// Phase name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial status; reconciled against the todos right after creation.
    #[serde(default)]
    pub status: PhaseStatus,
    /// Display order.
    #[serde(default)]
    pub order: i64,
    /// Checklist items.
    #[serde(default)]
    pub todos: Vec<NewTodo>,
}

impl NewPhase {
    /// A phase with the given name and no todos.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Set the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: PhaseStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a todo with the given status.
    #[must_use]
    pub fn with_todo(mut self, name: impl Into<String>, status: TodoStatus) -> Self {
        self.todos.push(NewTodo { name: name.into(), description: None, status });
        self
    }
}

/// Input for creating a todo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    /// Item name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Initial status.
    #[serde(default)]
    pub status: TodoStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        let created =
            DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        Task {
            id: 1,
            name: "Test".to_string(),
            description: None,
            priority: Priority::Medium,
            due_date: None,
            progress_percent: 50,
            status: TaskStatus::InProgress,
            interval_minutes: None,
            last_ping: created,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            skills: None,
            context_tags: None,
            definition_of_done: None,
            created_at: created,
        }
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("Critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(PhaseStatus::NotStarted.to_string(), "not_started");
        assert_eq!(TodoStatus::Done.as_str(), "done");
        assert_eq!("blocked".parse::<PhaseStatus>().unwrap(), PhaseStatus::Blocked);
        assert!("todo".parse::<PhaseStatus>().is_err());
    }

    #[test]
    fn test_parse_error_display() {
        let err = "finished".parse::<TodoStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid todo status: 'finished' (must be one of: todo, in_progress, done)"
        );
    }

    #[test]
    fn test_author_accepts_sub_agent_spellings() {
        assert_eq!("sub-agent".parse::<Author>().unwrap(), Author::SubAgent);
        assert_eq!("sub_agent".parse::<Author>().unwrap(), Author::SubAgent);
        assert_eq!(Author::SubAgent.to_string(), "sub-agent");
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&PhaseStatus::NotStarted).unwrap(), "\"not_started\"");
        assert_eq!(serde_json::to_string(&Author::SubAgent).unwrap(), "\"sub-agent\"");
        let status: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }

    #[test]
    fn test_effective_interval_default() {
        let mut task = sample_task();
        assert_eq!(task.effective_interval_minutes(), 60);
        task.interval_minutes = Some(5);
        assert_eq!(task.effective_interval_minutes(), 5);
    }

    #[test]
    fn test_is_stale() {
        let task = sample_task();
        assert!(!task.is_stale(task.last_ping + Duration::minutes(60)));
        assert!(task.is_stale(task.last_ping + Duration::minutes(61)));

        let mut done = task;
        done.status = TaskStatus::Done;
        assert!(!done.is_stale(done.last_ping + Duration::days(2)));
    }

    #[test]
    fn test_notification_messages() {
        assert_eq!(
            Notification::reminder_message(7, "Write docs"),
            "Task 'Write docs' (ID: 7) is still in progress and needs attention!"
        );
        assert_eq!(Notification::completion_message("Ship"), "Task 'Ship' has been completed!");
    }

    #[test]
    fn test_new_task_json_defaults() {
        let task: NewTask = serde_json::from_str(
            r#"{"name": "Ship it", "phases": [{"name": "P1", "todos": [{"name": "T1"}]}]}"#,
        )
        .unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.interval_minutes, Some(60));
        assert_eq!(task.agent_name, "Main Agent");
        assert_eq!(task.phases[0].status, PhaseStatus::NotStarted);
        assert_eq!(task.phases[0].todos[0].status, TodoStatus::Todo);
    }

    #[test]
    fn test_task_detail_flattens_task() {
        let detail = TaskDetail {
            task: sample_task(),
            phases: vec![],
            comments: vec![],
            unread_reminder_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Test");
        assert_eq!(json["progress_percent"], 50);
        assert_eq!(json["status"], "in_progress");
        let parsed: TaskDetail = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, detail);
    }
}
