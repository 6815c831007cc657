//! Task progress calculation.
//!
//! Every phase carries the same weight (`100 / phase_count`). A phase's share of that
//! weight depends on its status:
//!
//! | status                       | contribution                       |
//! |------------------------------|------------------------------------|
//! | `completed`                  | full weight                        |
//! | `blocked`                    | nothing                            |
//! | `in_progress`, `not_started` | weight × done todos / total todos  |
//! | any of the above, no todos   | nothing (unless `completed`)       |
//!
//! The sum is rounded half-up to an integer percent, and the legacy status label
//! follows from the percent.

use crate::tasks::models::{PhaseStatus, TaskStatus, TodoStatus};
use serde::Serialize;

/// What the calculator needs to know about one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSnapshot {
    /// Phase name, used in guard messages.
    pub name: String,
    /// Stored phase status.
    pub status: PhaseStatus,
    /// Statuses of the phase's todos.
    pub todos: Vec<TodoStatus>,
}

impl PhaseSnapshot {
    /// Build a snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, status: PhaseStatus, todos: Vec<TodoStatus>) -> Self {
        Self { name: name.into(), status, todos }
    }

    /// Number of todos marked done.
    #[must_use]
    pub fn done_count(&self) -> usize {
        self.todos.iter().filter(|t| t.is_done()).count()
    }
}

/// Derived progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Integer percent, 0-100.
    pub percent: u8,
    /// Legacy status label for that percent.
    pub status: TaskStatus,
}

/// Share of `weight` contributed by one phase.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn phase_contribution(weight: f64, phase: &PhaseSnapshot) -> f64 {
    match phase.status {
        PhaseStatus::Completed => weight,
        PhaseStatus::Blocked => 0.0,
        PhaseStatus::InProgress | PhaseStatus::NotStarted => {
            if phase.todos.is_empty() {
                0.0
            } else {
                weight * (phase.done_count() as f64 / phase.todos.len() as f64)
            }
        }
    }
}

/// Weighted progress across phases, rounded half-up.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn compute_percent(phases: &[PhaseSnapshot]) -> u8 {
    if phases.is_empty() {
        return 0;
    }

    let weight = 100.0 / phases.len() as f64;
    let total: f64 = phases.iter().map(|p| phase_contribution(weight, p)).sum();

    // f64::round goes away from zero on ties, which is half-up for a non-negative sum.
    total.round().clamp(0.0, 100.0) as u8
}

/// Legacy status label for a percent.
#[must_use]
pub const fn legacy_status(percent: u8) -> TaskStatus {
    if percent >= 100 {
        TaskStatus::Done
    } else if percent > 0 {
        TaskStatus::InProgress
    } else {
        TaskStatus::Todo
    }
}

/// Recompute a task's percent and legacy status from its phases.
#[must_use]
pub fn recompute(phases: &[PhaseSnapshot]) -> Progress {
    let percent = compute_percent(phases);
    Progress { percent, status: legacy_status(percent) }
}
