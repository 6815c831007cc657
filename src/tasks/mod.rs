//! Hierarchical task tracking.
//!
//! Tasks own phases, phases own todos. Todo changes roll up into the phase status
//! ([`aggregate`]), phases roll up into the task's percent and legacy status
//! ([`progress`]), and direct requests to finish a task pass through the
//! [`guard`]. Every status change leaves a comment behind ([`audit`]).
//!
//! # Example
//!
//! ```no_run
//! use status_tracker::tasks::{
//!     NewPhase, NewTask, SqliteTrackerStore, TaskStatus, TodoStatus, TrackerStore,
//! };
//!
//! let store = SqliteTrackerStore::new("/tmp/tracker.sqlite3").unwrap();
//!
//! let task = NewTask::named("Ship release")
//!     .with_phase(NewPhase::named("Build").with_todo("Compile", TodoStatus::Todo))
//!     .with_phase(NewPhase::named("Publish").with_todo("Upload", TodoStatus::Todo));
//! let detail = store.create_task(task).unwrap().into_inner();
//!
//! let compile = detail.phases[0].todos[0].id;
//! let task = store.update_todo_status(compile, TodoStatus::Done).unwrap().into_inner();
//! assert_eq!(task.progress_percent, 50);
//!
//! // Refused: "Upload" is still open.
//! assert!(store.update_task_status(task.id, TaskStatus::Done).is_err());
//! ```

pub mod aggregate;
pub mod audit;
pub mod batch;
pub mod guard;
pub mod models;
pub mod progress;
pub mod store;

pub use audit::{Applied, AuditFailure};
pub use batch::{BatchItem, BatchOutcome};
pub use guard::CompletionBlocked;
pub use models::{
    Author, Comment, NewPhase, NewTask, NewTodo, Notification, NotificationKind, ParseEnumError,
    Phase, PhaseDetail, PhaseStatus, Priority, Task, TaskDetail, TaskStatus, Todo, TodoStatus,
};
pub use progress::{PhaseSnapshot, Progress};
pub use store::{RepairReport, SqliteTrackerStore, TaskEdit, TaskFilter, TrackerStore};
